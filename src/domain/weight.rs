//! Body weight entries
//!
//! Weights live in their own collection, independent of the diary logs,
//! and are charted in ascending timestamp order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, WeightId};

/// A stored weight measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub id: WeightId,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
}

impl WeightRecord {
    pub fn from_existing(id: WeightId, weight: f64, timestamp: DateTime<Utc>) -> Self {
        Self { id, weight, timestamp }
    }

    /// Calendar day (UTC) the measurement belongs to
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A weight the user is about to submit
#[derive(Debug, Clone, PartialEq)]
pub struct WeightDraft {
    pub weight: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl WeightDraft {
    pub fn new(weight: f64) -> Result<Self, DomainError> {
        let draft = Self { weight, timestamp: None };
        draft.validate()?;
        Ok(draft)
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(DomainError::InvalidAmount("Please enter a valid weight.".to_string()));
        }
        Ok(())
    }
}

/// One point of the weight chart, as handed to the trend prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightPoint {
    pub date: NaiveDate,
    pub weight: f64,
}

impl From<&WeightRecord> for WeightPoint {
    fn from(record: &WeightRecord) -> Self {
        Self {
            date: record.date(),
            weight: record.weight,
        }
    }
}
