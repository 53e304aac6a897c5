//! Structured results of the AI features

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, LogDraft};

/// Notes attached to meals logged straight from a recipe suggestion
pub const RECIPE_NOTE: &str = "(From AI Recipe)";

/// Quick trigger check of a meal description
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCheck {
    pub message: String,
    pub is_warning: bool,
}

impl MealCheck {
    pub fn from_reply(message: impl Into<String>) -> Self {
        let message = message.into();
        let is_warning = message.contains("Warning");
        Self { message, is_warning }
    }

    /// Prepend a warning to the meal's notes unless the notes already carry it
    pub fn merge_into_notes(&self, notes: &str) -> String {
        if !self.is_warning || notes.contains(&self.message) {
            return notes.to_string();
        }
        format!("{}\n\n{}", self.message, notes).trim().to_string()
    }
}

/// One recipe as the model describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub recipe_name: String,
    #[serde(default)]
    pub calories: Option<String>,
    #[serde(default)]
    pub protein: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Preparation steps in order
    #[serde(default)]
    pub recipe: Vec<String>,
}

impl Recipe {
    /// A meal log pre-filled from this recipe
    pub fn to_meal_draft(&self, notes: Option<&str>) -> Result<LogDraft, DomainError> {
        let notes = notes.filter(|n| !n.trim().is_empty()).unwrap_or(RECIPE_NOTE);
        LogDraft::meal(&self.recipe_name, self.calories.clone(), self.protein.clone(), notes)
    }
}

/// A recipe idea, with the requested trigger version alongside when the
/// prompt asked for trigger foods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSuggestion {
    pub is_trigger: bool,
    pub safe_recipe: Recipe,
    #[serde(default)]
    pub trigger_recipe: Option<Recipe>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyRating {
    Safe,
    Avoid,
    Caution,
}

/// Verdict on a packaged product or ingredient list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVerdict {
    pub is_safe: SafetyRating,
    pub reason: String,
    #[serde(default)]
    pub triggers_found: Vec<String>,
}
