//! Resilient JSON POST with exponential backoff
//!
//! Rate limits (429) and server errors (5xx) are retried after a delay that
//! starts at `initial_delay` and doubles each time, without jitter, until the
//! retry budget runs out. Every other non-2xx status fails at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::gemini::AiError;

/// Status line and body of an HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    /// Reason phrase ("Service Unavailable"), if the transport knows it
    pub reason: Option<String>,
    pub body: String,
}

/// Sends one JSON POST and reports whatever came back
///
/// Implementations must not retry on their own and must return non-2xx
/// statuses as an `HttpReply` rather than an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<HttpReply, AiError>;
}

/// Waits between attempts
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// `reqwest`-backed transport used in production
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client, optionally with an overall request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self, AiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AiError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<HttpReply, AiError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AiError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Transport(e.without_url().to_string()))?;

        Ok(HttpReply {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

/// Sleeps on the tokio timer
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How many times to retry and how long to wait before the first retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Only rate limiting and server-side failures are worth another attempt
    pub fn is_retryable(status: u16) -> bool {
        status == 429 || status >= 500
    }
}

/// Human-readable message for a failed response
///
/// Prefers the JSON error envelope's `error.message`, then the reason
/// phrase, then a generic `HTTP Error {code}`.
pub fn extract_error_message(status: u16, reason: Option<&str>, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        json.pointer("/error/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    });

    from_body
        .or_else(|| reason.filter(|r| !r.is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP Error {}", status))
}

/// Posts JSON payloads and applies the retry policy
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    delay: Arc<dyn Delay>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self::with_delay(transport, Arc::new(TokioDelay), policy)
    }

    pub fn with_delay(transport: Arc<dyn Transport>, delay: Arc<dyn Delay>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            delay,
            policy,
        }
    }

    /// POST `payload` to `endpoint`, returning the parsed 2xx body unmodified
    pub async fn execute(&self, endpoint: &str, payload: &Value) -> Result<Value, AiError> {
        let mut retries_left = self.policy.max_retries;
        let mut delay = self.policy.initial_delay;

        loop {
            let reply = self.transport.post_json(endpoint, payload).await?;

            if (200..300).contains(&reply.status) {
                debug!("AI request succeeded with status {}", reply.status);
                return serde_json::from_str(&reply.body).map_err(AiError::MalformedResponse);
            }

            let message = extract_error_message(reply.status, reply.reason.as_deref(), &reply.body);

            if RetryPolicy::is_retryable(reply.status) && retries_left > 0 {
                warn!(
                    status = reply.status,
                    retries_left,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying AI request: {}",
                    message
                );
                self.delay.wait(delay).await;
                retries_left -= 1;
                delay = delay.saturating_mul(2);
                continue;
            }

            error!(status = reply.status, "AI request failed: {}", message);
            return Err(AiError::Http {
                status: reply.status,
                message,
            });
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use serde_json::json;

    fn executor(replies: Vec<HttpReply>, max_retries: u32) -> (RequestExecutor, Arc<ScriptedTransport>, Arc<RecordingDelay>) {
        let transport = Arc::new(ScriptedTransport::new(replies));
        let delay = Arc::new(RecordingDelay::default());
        let policy = RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
        };
        let executor = RequestExecutor::with_delay(transport.clone(), delay.clone(), policy);
        (executor, transport, delay)
    }

    #[tokio::test]
    async fn test_two_server_errors_then_success() {
        let (executor, transport, delay) = executor(
            vec![reply(500, ""), reply(500, ""), reply(200, r#"{"ok":true}"#)],
            3,
        );

        let result = executor.execute("http://ai.test", &json!({})).await.unwrap();

        assert_eq!(result, json!({"ok": true}));
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            *delay.waits.lock().unwrap(),
            vec![Duration::from_millis(1), Duration::from_millis(2)]
        );
    }

    #[tokio::test]
    async fn test_retryable_statuses_exhaust_budget_with_doubling_delay() {
        for status in [429u16, 500, 502, 503] {
            let body = format!(r#"{{"error":{{"message":"attempt failed with {}"}}}}"#, status);
            let replies = (0..4).map(|_| reply(status, &body)).collect();
            let (executor, transport, delay) = executor(replies, 3);

            let err = executor.execute("http://ai.test", &json!({})).await.unwrap_err();

            match err {
                AiError::Http { status: s, message } => {
                    assert_eq!(s, status);
                    assert_eq!(message, format!("attempt failed with {}", status));
                }
                other => panic!("unexpected error {:?}", other),
            }
            assert_eq!(transport.calls(), 4, "status {}", status);
            assert_eq!(
                *delay.waits.lock().unwrap(),
                vec![Duration::from_millis(1), Duration::from_millis(2), Duration::from_millis(4)]
            );
        }
    }

    #[tokio::test]
    async fn test_client_errors_fail_immediately() {
        for status in [400u16, 401, 403, 404] {
            let (executor, transport, delay) = executor(vec![reply(status, ""), reply(200, "{}")], 3);

            let err = executor.execute("http://ai.test", &json!({})).await.unwrap_err();

            assert!(matches!(err, AiError::Http { status: s, .. } if s == status));
            assert_eq!(transport.calls(), 1);
            assert!(delay.waits.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_zero_budget_does_not_retry() {
        let (executor, transport, _) = executor(vec![reply(503, "")], 0);
        let err = executor.execute("http://ai.test", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP Error 503");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_success_body() {
        let (executor, _, _) = executor(vec![reply(200, "<html>")], 3);
        let err = executor.execute("http://ai.test", &json!({})).await.unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse(_)));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            extract_error_message(400, Some("Bad Request"), r#"{"error":{"message":"API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(extract_error_message(400, Some("Bad Request"), "not json"), "Bad Request");
        assert_eq!(extract_error_message(400, Some("Bad Request"), r#"{"error":{}}"#), "Bad Request");
        assert_eq!(extract_error_message(418, None, ""), "HTTP Error 418");
        assert_eq!(extract_error_message(418, Some(""), r#"{"error":{"message":""}}"#), "HTTP Error 418");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RetryPolicy::is_retryable(429));
        assert!(RetryPolicy::is_retryable(500));
        assert!(RetryPolicy::is_retryable(599));
        assert!(!RetryPolicy::is_retryable(400));
        assert!(!RetryPolicy::is_retryable(404));
        assert!(!RetryPolicy::is_retryable(428));
    }
}
