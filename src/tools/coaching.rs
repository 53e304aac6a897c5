//! Tools backed by the AI coach
//!
//! Arguments are checked here; the request itself runs as a
//! [`PendingRequest`] the server can cancel. Each request works on the diary
//! snapshot taken when the tool was called.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::coach::{Coach, CoachError, Feature, PendingRequest};
use crate::diary::Diary;
use crate::tools::{parse_date, render_json, ToolError};

/// Parameters for the daily analysis
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DailyReportParams {
    /// UTC day to analyze (YYYY-MM-DD); defaults to today
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChatParams {
    pub question: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckMealParams {
    /// The meal as the user would log it
    pub description: String,
    /// Notes drafted so far; a warning is prepended to them
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestRecipeParams {
    /// A meal idea, e.g. "chicken and broccoli"
    pub idea: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckProductParams {
    /// Product name or its ingredient list
    pub product: String,
}

/// Meal check result together with the notes to log the meal with
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCheckResponse {
    pub message: String,
    pub is_warning: bool,
    pub notes: String,
}

pub fn start_daily_report(
    coach: &Coach,
    diary: &Diary,
    params: DailyReportParams,
) -> Result<PendingRequest<String>, ToolError> {
    let date = match params.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().date_naive(),
    };
    let logs = diary.logs();

    Ok(coach.spawn(Feature::DailyReport, move |coach| async move {
        coach.daily_report(&logs, date).await
    }))
}

pub fn start_weekly_report(coach: &Coach, diary: &Diary) -> PendingRequest<String> {
    let logs = diary.logs();
    coach.spawn(Feature::WeeklyReport, move |coach| async move {
        coach.weekly_report(&logs, Utc::now()).await
    })
}

pub fn start_weight_trend(coach: &Coach, diary: &Diary) -> PendingRequest<String> {
    let logs = diary.logs();
    let weights = diary.weights();
    coach.spawn(Feature::WeightTrend, move |coach| async move {
        coach.weight_trend(&logs, &weights, Utc::now()).await
    })
}

pub fn start_chat(coach: &Coach, diary: &Diary, params: ChatParams) -> PendingRequest<String> {
    let logs = diary.logs();
    coach.spawn(Feature::Chat, move |coach| async move {
        coach.chat(&logs, &params.question).await
    })
}

pub fn start_check_meal(coach: &Coach, params: CheckMealParams) -> PendingRequest<String> {
    coach.spawn(Feature::MealCheck, move |coach| async move {
        let check = coach.check_meal(&params.description).await?;
        let notes = check.merge_into_notes(params.notes.as_deref().unwrap_or_default());
        let response = MealCheckResponse {
            message: check.message,
            is_warning: check.is_warning,
            notes,
        };
        render_json(&response).map_err(CoachError::output(Feature::MealCheck))
    })
}

pub fn start_suggest_recipe(coach: &Coach, params: SuggestRecipeParams) -> PendingRequest<String> {
    coach.spawn(Feature::Recipe, move |coach| async move {
        let suggestion = coach.suggest_recipe(&params.idea).await?;
        render_json(&suggestion).map_err(CoachError::output(Feature::Recipe))
    })
}

pub fn start_shopping_list(coach: &Coach) -> PendingRequest<String> {
    coach.spawn(Feature::ShoppingList, |coach| async move { coach.shopping_list().await })
}

pub fn start_check_product(coach: &Coach, params: CheckProductParams) -> PendingRequest<String> {
    coach.spawn(Feature::ProductCheck, move |coach| async move {
        let verdict = coach.check_product(&params.product).await?;
        render_json(&verdict).map_err(CoachError::output(Feature::ProductCheck))
    })
}
