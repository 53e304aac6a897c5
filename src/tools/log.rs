//! Tools for adding entries to the diary
//!
//! Implements `log_meal`, `log_recipe`, `log_water`, `log_feelings` and
//! `log_weight`. Input is validated before the store is touched.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::coach::Recipe;
use crate::domain::{LogDraft, LogRecord, UserId, WeightDraft, WeightRecord, RATING_MAX};
use crate::storage::LogStore;
use crate::tools::{parse_timestamp, ToolError};

/// Parameters for logging a meal
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogMealParams {
    /// What was eaten
    pub description: String,
    /// Display string such as "~550 kcal"
    #[serde(default)]
    pub calories: Option<String>,
    /// Display string such as "~45g protein"
    #[serde(default)]
    pub protein: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// RFC 3339 time of the meal; defaults to now
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parameters for logging a suggested recipe as a meal
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogRecipeParams {
    /// A recipe object exactly as returned by `suggest_recipe`
    pub recipe: Recipe,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parameters for logging water intake
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogWaterParams {
    /// Amount in ml
    pub amount: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parameters for logging how the user feels; each rating is 1 (worst) to 5 (best)
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogFeelingsParams {
    pub skin: u8,
    pub bloating: u8,
    pub stool: u8,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parameters for logging body weight
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogWeightParams {
    pub weight: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response from creating a log
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub success: bool,
    pub message: String,
    pub log: LogRecord,
}

/// Response from creating a weight entry
#[derive(Debug, Serialize)]
pub struct WeightResponse {
    pub success: bool,
    pub message: String,
    pub weight: WeightRecord,
}

const SAVE_LOG_FAILED: &str = "Failed to save your log. Please try again.";
const SAVE_WEIGHT_FAILED: &str = "Failed to save weight. Please try again.";

fn stamp(draft: LogDraft, timestamp: Option<&str>) -> Result<LogDraft, ToolError> {
    Ok(match timestamp {
        Some(raw) => draft.at(parse_timestamp(raw)?),
        None => draft,
    })
}

fn save<S: LogStore + ?Sized>(store: &S, user: &UserId, draft: LogDraft) -> Result<LogRecord, ToolError> {
    store.create_log(user, draft).map_err(|source| ToolError::Save {
        message: SAVE_LOG_FAILED,
        source,
    })
}

pub fn log_meal<S: LogStore + ?Sized>(store: &S, user: &UserId, params: LogMealParams) -> Result<LogResponse, ToolError> {
    let draft = LogDraft::meal(
        params.description,
        params.calories,
        params.protein,
        params.notes.unwrap_or_default(),
    )?;
    let log = save(store, user, stamp(draft, params.timestamp.as_deref())?)?;

    Ok(LogResponse {
        success: true,
        message: format!("Logged meal at {}.", log.timestamp.format("%Y-%m-%d %H:%M UTC")),
        log,
    })
}

pub fn log_recipe<S: LogStore + ?Sized>(
    store: &S,
    user: &UserId,
    params: LogRecipeParams,
) -> Result<LogResponse, ToolError> {
    let draft = params.recipe.to_meal_draft(params.notes.as_deref())?;
    let log = save(store, user, stamp(draft, params.timestamp.as_deref())?)?;

    Ok(LogResponse {
        success: true,
        message: format!("Logged '{}' as a meal.", params.recipe.recipe_name),
        log,
    })
}

pub fn log_water<S: LogStore + ?Sized>(store: &S, user: &UserId, params: LogWaterParams) -> Result<LogResponse, ToolError> {
    let draft = LogDraft::water(params.amount, params.notes.unwrap_or_default())?;
    let log = save(store, user, stamp(draft, params.timestamp.as_deref())?)?;

    Ok(LogResponse {
        success: true,
        message: format!("Logged {} ml of water.", params.amount),
        log,
    })
}

pub fn log_feelings<S: LogStore + ?Sized>(
    store: &S,
    user: &UserId,
    params: LogFeelingsParams,
) -> Result<LogResponse, ToolError> {
    let draft = LogDraft::feelings(params.skin, params.bloating, params.stool, params.notes.unwrap_or_default())?;
    let log = save(store, user, stamp(draft, params.timestamp.as_deref())?)?;

    Ok(LogResponse {
        success: true,
        message: format!(
            "Logged feelings (skin {}/{max}, bloating {}/{max}, stool {}/{max}).",
            params.skin,
            params.bloating,
            params.stool,
            max = RATING_MAX
        ),
        log,
    })
}

pub fn log_weight<S: LogStore + ?Sized>(
    store: &S,
    user: &UserId,
    params: LogWeightParams,
) -> Result<WeightResponse, ToolError> {
    let mut draft = WeightDraft::new(params.weight)?;
    if let Some(raw) = params.timestamp.as_deref() {
        draft = draft.at(parse_timestamp(raw)?);
    }

    let weight = store.create_weight(user, draft).map_err(|source| ToolError::Save {
        message: SAVE_WEIGHT_FAILED,
        source,
    })?;

    Ok(WeightResponse {
        success: true,
        message: format!("Logged weight {}.", weight.weight),
        weight,
    })
}
