//! Tool for showing the fixed meal plan for a day

use chrono::{Datelike, Utc, Weekday};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::prompts::{DayPlan, WeeklyPlan};
use crate::tools::ToolError;

/// Parameters for looking up a day's plan
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TodayPlanParams {
    /// Weekday name such as "monday" or "Tue"; defaults to today (UTC)
    #[serde(default)]
    pub weekday: Option<String>,
}

pub fn today_plan(plan: &WeeklyPlan, params: TodayPlanParams) -> Result<String, ToolError> {
    let weekday = match params.weekday.as_deref().map(str::trim) {
        None | Some("") => Utc::now().weekday(),
        Some(raw) => raw
            .parse::<Weekday>()
            .map_err(|_| ToolError::Invalid(format!("Unknown weekday '{}'", raw)))?,
    };

    let day = plan
        .day(weekday)
        .ok_or_else(|| ToolError::Invalid(format!("No plan for {}", weekday)))?;
    Ok(format_day(day))
}

fn format_day(day: &DayPlan) -> String {
    let mut out = format!("{}'s plan\n", day.day);
    for slot in &day.meal_slots {
        out.push_str(&format!("\n{}: {}\n  {}", slot.name, slot.recipe, slot.details));
    }
    out.push_str(&format!("\n\nIngredients: {}", day.ingredients.join(", ")));
    out
}
