//! `generateContent` request envelope and response extraction

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::gemini::{AiError, ReqwestTransport, RequestExecutor, RetryPolicy};

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Asks the model for strict JSON, optionally shaped by a schema
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    pub fn json(schema: Option<Value>) -> Self {
        Self {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        }
    }
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            contents: vec![Content::text(user)],
            system_instruction: Content::text(system),
            generation_config: None,
        }
    }

    pub fn with_json_output(mut self, schema: Option<Value>) -> Self {
        self.generation_config = Some(GenerationConfig::json(schema));
        self
    }
}

/// Generated text at `candidates[0].content.parts[0].text`
///
/// Blank text counts as missing.
pub fn extract_text(response: &Value) -> Option<&str> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Locate the first balanced `{...}` span in `raw`
///
/// Models asked for JSON sometimes wrap it in commentary or code fences.
/// Braces inside JSON strings are ignored.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Talks to one model of the generative-language API
#[derive(Clone)]
pub struct GeminiClient {
    executor: RequestExecutor,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        executor: RequestExecutor,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Production client over `reqwest` with the configured retry policy
    pub fn from_config(config: &Config) -> Result<Self, AiError> {
        let transport = ReqwestTransport::new(config.request_timeout_secs.map(Duration::from_secs))?;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        };
        let executor = RequestExecutor::new(Arc::new(transport), policy);
        Ok(Self::new(executor, &config.api_base_url, &config.model, &config.api_key))
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key)
    }

    /// Send a prepared request and return the raw response body
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Value, AiError> {
        let payload = serde_json::to_value(request).map_err(AiError::MalformedResponse)?;
        debug!(model = %self.model, "Sending generateContent request");
        self.executor.execute(&self.endpoint(), &payload).await
    }

    /// Free-form text (usually simple HTML) for a system instruction and user message
    pub async fn generate_text(&self, system: &str, user: &str) -> Result<String, AiError> {
        let response = self.generate(&GenerateRequest::new(system, user)).await?;
        extract_text(&response).map(str::to_string).ok_or(AiError::NoContent)
    }

    /// Strict JSON output, parsed into `T`
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        schema: Option<Value>,
    ) -> Result<T, AiError> {
        let request = GenerateRequest::new(system, user).with_json_output(schema);
        let response = self.generate(&request).await?;
        let text = extract_text(&response).ok_or(AiError::NoContent)?;
        parse_json_reply(text)
    }
}

/// Parse the first JSON object embedded in a model reply
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let span = extract_json_object(text).ok_or_else(|| AiError::MalformedJson("no JSON object in reply".to_string()))?;
    serde_json::from_str(span).map_err(|e| AiError::MalformedJson(e.to_string()))
}
