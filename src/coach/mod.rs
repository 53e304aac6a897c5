//! AI coaching features
//!
//! Every feature validates its input, slices the diary to the range it
//! needs, assembles a prompt and asks the model. Validation always happens
//! before any network call. Failures map to one fixed user-facing message
//! per feature via [`CoachError::user_message`].

pub mod pending;
pub mod replies;

pub use pending::{FeatureState, PendingRequest};
pub use replies::*;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, error};

use crate::domain::{aggregate_by_day, daily_summaries, DailySummary, DomainError, LogRecord, WeightPoint, WeightRecord};
use crate::gemini::{AiError, GeminiClient};
use crate::prompts::{self, WeeklyPlan};

/// Logs newer than this feed the weekly report and the weight trend
pub const REPORT_WINDOW_DAYS: i64 = 7;
/// Most recent logs handed to the chat as memory
pub const CHAT_CONTEXT_LOGS: usize = 20;
/// Fewest weight entries a trend can be drawn from
pub const MIN_TREND_WEIGHTS: usize = 2;

/// The AI-backed features, used to pick failure wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    DailyReport,
    WeeklyReport,
    WeightTrend,
    Chat,
    MealCheck,
    Recipe,
    ShoppingList,
    ProductCheck,
}

impl Feature {
    /// What the user sees when the request itself failed
    pub fn failure_message(&self) -> &'static str {
        match self {
            Feature::DailyReport | Feature::WeightTrend => "Failed to generate your analysis. Please try again later.",
            Feature::WeeklyReport => "Failed to generate your insights. Please try again later.",
            Feature::Chat => "<p>Sorry, I'm having trouble connecting right now. Please try again later.</p>",
            Feature::MealCheck => "Analysis failed. Check connection.",
            Feature::Recipe => {
                "Sorry, I couldn't generate that idea. It might contain ingredients I'm not sure about. Please try a different prompt."
            }
            Feature::ShoppingList => "Sorry, I couldn't generate the shopping list. Please try again.",
            Feature::ProductCheck => "Sorry, I couldn't analyze that product. Please try again.",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::DailyReport => "daily report",
            Feature::WeeklyReport => "weekly report",
            Feature::WeightTrend => "weight trend",
            Feature::Chat => "chat",
            Feature::MealCheck => "meal check",
            Feature::Recipe => "recipe suggestion",
            Feature::ShoppingList => "shopping list",
            Feature::ProductCheck => "product check",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CoachError {
    /// Rejected before any request was made; the message is shown as-is
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{feature} failed: {source}")]
    Ai {
        feature: Feature,
        #[source]
        source: AiError,
    },

    #[error("{feature} failed to assemble its prompt: {source}")]
    Prompt {
        feature: Feature,
        #[source]
        source: serde_json::Error,
    },

    #[error("{feature} result could not be rendered: {source}")]
    Output {
        feature: Feature,
        #[source]
        source: serde_json::Error,
    },

    #[error("{feature} request was cancelled")]
    Cancelled { feature: Feature },

    #[error("{feature} request task failed: {reason}")]
    Task { feature: Feature, reason: String },
}

impl CoachError {
    fn ai(feature: Feature) -> impl FnOnce(AiError) -> CoachError {
        move |source| CoachError::Ai { feature, source }
    }

    fn prompt(feature: Feature) -> impl FnOnce(serde_json::Error) -> CoachError {
        move |source| CoachError::Prompt { feature, source }
    }

    pub fn output(feature: Feature) -> impl FnOnce(serde_json::Error) -> CoachError {
        move |source| CoachError::Output { feature, source }
    }

    /// The message to show for this failure
    pub fn user_message(&self) -> String {
        match self {
            CoachError::Validation(message) => message.clone(),
            CoachError::Domain(e) => e.to_string(),
            CoachError::Ai {
                feature: Feature::MealCheck,
                source: AiError::NoContent,
            } => "Could not analyze meal.".to_string(),
            CoachError::Ai { feature, .. }
            | CoachError::Prompt { feature, .. }
            | CoachError::Output { feature, .. }
            | CoachError::Task { feature, .. } => feature.failure_message().to_string(),
            CoachError::Cancelled { .. } => "Request cancelled.".to_string(),
        }
    }
}

/// Runs the AI features against the diary snapshots it is handed
#[derive(Clone)]
pub struct Coach {
    client: Arc<GeminiClient>,
    plan: Arc<WeeklyPlan>,
}

impl Coach {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client: Arc::new(client),
            plan: Arc::new(prompts::standard_plan()),
        }
    }

    pub fn plan(&self) -> &WeeklyPlan {
        &self.plan
    }

    /// Run a feature on its own task so the caller can abandon it
    pub fn spawn<T, F, Fut>(&self, feature: Feature, request: F) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(Coach) -> Fut,
        Fut: Future<Output = Result<T, CoachError>> + Send + 'static,
    {
        PendingRequest::spawn(feature, request(self.clone()))
    }

    async fn ask(&self, feature: Feature, system: &str, user: &str) -> Result<String, CoachError> {
        debug!("Requesting {}", feature);
        self.client.generate_text(system, user).await.map_err(|e| {
            error!("AI {} failed: {}", feature, e);
            CoachError::ai(feature)(e)
        })
    }

    /// Analysis of one calendar day (UTC)
    pub async fn daily_report(&self, logs: &[LogRecord], date: NaiveDate) -> Result<String, CoachError> {
        let day_logs: Vec<LogRecord> = logs.iter().filter(|log| log.timestamp.date_naive() == date).cloned().collect();
        let summary = aggregate_by_day(&day_logs)
            .remove(&date)
            .unwrap_or_else(|| DailySummary::new(date));

        if !summary.has_meals_or_feelings() {
            return Err(CoachError::Validation(
                "No food or feelings logged yet today. Add a log first!".to_string(),
            ));
        }

        let message = prompts::daily_report_message(&summary).map_err(CoachError::prompt(Feature::DailyReport))?;
        self.ask(Feature::DailyReport, &prompts::daily_analysis_instruction(), &message)
            .await
    }

    /// Report over every log from the last seven days
    pub async fn weekly_report(&self, logs: &[LogRecord], now: DateTime<Utc>) -> Result<String, CoachError> {
        let recent = recent_logs(logs, now);
        if recent.is_empty() {
            return Err(CoachError::Validation(
                "Not enough logs from the past 7 days to analyze.".to_string(),
            ));
        }

        let days = daily_summaries(&recent);
        let message = prompts::weekly_report_message(&days).map_err(CoachError::prompt(Feature::WeeklyReport))?;
        self.ask(Feature::WeeklyReport, &prompts::weekly_analysis_instruction(), &message)
            .await
    }

    /// Relate the weight curve to the last seven days of logs
    pub async fn weight_trend(
        &self,
        logs: &[LogRecord],
        weights: &[WeightRecord],
        now: DateTime<Utc>,
    ) -> Result<String, CoachError> {
        if weights.len() < MIN_TREND_WEIGHTS {
            return Err(CoachError::Validation(
                "Not enough weight data to analyze. Log at least two entries.".to_string(),
            ));
        }

        let points: Vec<WeightPoint> = weights.iter().map(WeightPoint::from).collect();
        let days = daily_summaries(&recent_logs(logs, now));
        let message =
            prompts::weight_trend_message(&points, &days).map_err(CoachError::prompt(Feature::WeightTrend))?;
        self.ask(Feature::WeightTrend, &prompts::weight_trend_instruction(), &message)
            .await
    }

    /// Answer a question with the newest logs as memory
    ///
    /// `logs` is expected newest first, as the store delivers it.
    pub async fn chat(&self, logs: &[LogRecord], question: &str) -> Result<String, CoachError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoachError::Validation("Please enter a question.".to_string()));
        }

        let context = &logs[..logs.len().min(CHAT_CONTEXT_LOGS)];
        let message =
            prompts::chat_message(&daily_summaries(context), question).map_err(CoachError::prompt(Feature::Chat))?;
        self.ask(Feature::Chat, &prompts::chat_instruction(), &message).await
    }

    /// Flag likely trigger foods in a meal description
    pub async fn check_meal(&self, description: &str) -> Result<MealCheck, CoachError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(DomainError::EmptyMealDescription.into());
        }

        let reply = self
            .ask(Feature::MealCheck, &prompts::meal_check_instruction(), description)
            .await?;
        Ok(MealCheck::from_reply(reply.trim()))
    }

    /// A safe recipe for a meal idea, plus the trigger version when asked for one
    pub async fn suggest_recipe(&self, idea: &str) -> Result<RecipeSuggestion, CoachError> {
        let idea = idea.trim();
        if idea.is_empty() {
            return Err(CoachError::Validation(
                "Please enter a meal idea, e.g., 'chicken and broccoli'.".to_string(),
            ));
        }

        debug!("Requesting {}", Feature::Recipe);
        self.client
            .generate_json(&prompts::recipe_instruction(), idea, Some(prompts::recipe_schema()))
            .await
            .map_err(|e| {
                error!("AI {} failed: {}", Feature::Recipe, e);
                CoachError::ai(Feature::Recipe)(e)
            })
    }

    /// HTML shopping list for the weekly plan
    pub async fn shopping_list(&self) -> Result<String, CoachError> {
        let message = prompts::shopping_list_message(&self.plan).map_err(CoachError::prompt(Feature::ShoppingList))?;
        self.ask(Feature::ShoppingList, &prompts::shopping_list_instruction(), &message)
            .await
    }

    /// Judge a product name or ingredient list against the diet rules
    pub async fn check_product(&self, product: &str) -> Result<ProductVerdict, CoachError> {
        let product = product.trim();
        if product.is_empty() {
            return Err(CoachError::Validation(
                "Please enter a product or ingredient list.".to_string(),
            ));
        }

        debug!("Requesting {}", Feature::ProductCheck);
        self.client
            .generate_json(
                &prompts::product_check_instruction(),
                product,
                Some(prompts::product_verdict_schema()),
            )
            .await
            .map_err(|e| {
                error!("AI {} failed: {}", Feature::ProductCheck, e);
                CoachError::ai(Feature::ProductCheck)(e)
            })
    }
}

/// Logs stamped within the report window ending at `now`
fn recent_logs(logs: &[LogRecord], now: DateTime<Utc>) -> Vec<LogRecord> {
    let cutoff = now - Duration::days(REPORT_WINDOW_DAYS);
    logs.iter().filter(|log| log.timestamp >= cutoff).cloned().collect()
}
