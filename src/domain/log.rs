//! Meal, water and feelings log records
//!
//! A `LogRecord` is one entry in the user's diary. The three kinds share an
//! id, a timestamp and free-text notes; the kind-specific fields live in
//! `LogKind` so exactly one variant is ever populated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, LogId};

/// Lowest (worst) value of a feelings rating
pub const RATING_MIN: u8 = 1;
/// Highest (best) value of a feelings rating
pub const RATING_MAX: u8 = 5;

/// A meal as the user described it
///
/// `calories` and `protein` are display strings ("~550 kcal") copied from
/// recipe suggestions or typed by hand; they are never parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDetails {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<String>,
}

/// A glass (or bottle) of water, in millilitres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterDetails {
    pub amount: f64,
}

/// Subjective symptom ratings, each 1 (worst) to 5 (best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeelingsRating {
    pub skin: u8,
    pub bloating: u8,
    pub stool: u8,
}

impl FeelingsRating {
    /// Build a validated rating triple
    pub fn new(skin: u8, bloating: u8, stool: u8) -> Result<Self, DomainError> {
        let rating = Self { skin, bloating, stool };
        rating.validate()?;
        Ok(rating)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [("skin", self.skin), ("bloating", self.bloating), ("stool", self.stool)] {
            if !(RATING_MIN..=RATING_MAX).contains(&value) {
                return Err(DomainError::InvalidRating { field, value });
            }
        }
        Ok(())
    }
}

/// The kind-specific part of a log record
///
/// Serialized with a `type` discriminant (`meal`, `water`, `feelings`),
/// which is also the shape persisted in the store's `details` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogKind {
    Meal(MealDetails),
    Water(WaterDetails),
    Feelings(FeelingsRating),
}

impl LogKind {
    /// The discriminant as stored and shown to clients
    pub fn name(&self) -> &'static str {
        match self {
            LogKind::Meal(_) => "meal",
            LogKind::Water(_) => "water",
            LogKind::Feelings(_) => "feelings",
        }
    }

    /// Check the invariants of whichever variant is populated
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            LogKind::Meal(meal) => {
                if meal.description.trim().is_empty() {
                    return Err(DomainError::EmptyMealDescription);
                }
            }
            LogKind::Water(water) => {
                if !water.amount.is_finite() || water.amount <= 0.0 {
                    return Err(DomainError::InvalidAmount(
                        "Please enter a valid water amount in ml.".to_string(),
                    ));
                }
            }
            LogKind::Feelings(rating) => rating.validate()?,
        }
        Ok(())
    }
}

/// A stored diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Assigned by the store on create
    pub id: LogId,
    /// Authoritative ordering key
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub kind: LogKind,
}

impl LogRecord {
    /// Rebuild a record loaded from the store (already validated on create)
    pub fn from_existing(id: LogId, timestamp: DateTime<Utc>, notes: String, kind: LogKind) -> Self {
        Self {
            id,
            timestamp,
            notes,
            kind,
        }
    }
}

/// A log the user is about to submit
///
/// Drafts are validated before any store call. A draft without a timestamp
/// is stamped by the store at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDraft {
    pub timestamp: Option<DateTime<Utc>>,
    pub notes: String,
    pub kind: LogKind,
}

impl LogDraft {
    /// Draft a meal log; the description must not be blank
    pub fn meal(
        description: impl Into<String>,
        calories: Option<String>,
        protein: Option<String>,
        notes: impl Into<String>,
    ) -> Result<Self, DomainError> {
        Self::new(
            LogKind::Meal(MealDetails {
                description: description.into().trim().to_string(),
                calories: calories.filter(|c| !c.trim().is_empty()),
                protein: protein.filter(|p| !p.trim().is_empty()),
            }),
            notes,
        )
    }

    /// Draft a water log; the amount must be a positive number of ml
    pub fn water(amount: f64, notes: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(LogKind::Water(WaterDetails { amount }), notes)
    }

    /// Draft a feelings log with three 1-5 ratings
    pub fn feelings(skin: u8, bloating: u8, stool: u8, notes: impl Into<String>) -> Result<Self, DomainError> {
        let rating = FeelingsRating::new(skin, bloating, stool)?;
        Self::new(LogKind::Feelings(rating), notes)
    }

    fn new(kind: LogKind, notes: impl Into<String>) -> Result<Self, DomainError> {
        kind.validate()?;
        Ok(Self {
            timestamp: None,
            notes: notes.into(),
            kind,
        })
    }

    /// Backdate (or future-date) the entry instead of using the write time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.kind.validate()
    }
}
