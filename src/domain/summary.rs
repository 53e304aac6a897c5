//! Per-day aggregation of diary logs
//!
//! Every AI report works from the same shape: logs grouped by UTC calendar
//! day, meals and water in input order, and a single feelings triple per
//! day. The report builders only differ in which slice of logs they feed in.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{FeelingsRating, LogKind, LogRecord};

/// A meal as it appears in a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionEntry {
    pub item: String,
    pub notes: String,
}

/// A water intake as it appears in a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterEntry {
    pub amount: f64,
    pub unit: &'static str,
}

/// Everything logged on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub consumption_logs: Vec<ConsumptionEntry>,
    pub water_logs: Vec<WaterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feelings_log: Option<FeelingsRating>,
    /// Timestamp of the feelings record currently held, for tie-breaking
    #[serde(skip)]
    feelings_at: Option<DateTime<Utc>>,
}

impl DailySummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            consumption_logs: Vec::new(),
            water_logs: Vec::new(),
            feelings_log: None,
            feelings_at: None,
        }
    }

    /// Sum of the day's water entries in ml
    pub fn total_water_ml(&self) -> f64 {
        self.water_logs.iter().map(|w| w.amount).sum()
    }

    /// Whether there is anything for a daily analysis to talk about
    pub fn has_meals_or_feelings(&self) -> bool {
        !self.consumption_logs.is_empty() || self.feelings_log.is_some()
    }

    fn record_feelings(&mut self, rating: FeelingsRating, at: DateTime<Utc>) {
        // Latest timestamp wins; on a tie the later record in the input wins.
        let replace = match self.feelings_at {
            Some(held) => at >= held,
            None => true,
        };
        if replace {
            self.feelings_log = Some(rating);
            self.feelings_at = Some(at);
        }
    }
}

/// Group logs by UTC calendar day
///
/// Meals and water keep their input order within a day. When a day has
/// more than one feelings record, the one with the latest timestamp is
/// kept (ties go to the one appearing later in `records`), so the result
/// does not depend on the order the store happened to report.
pub fn aggregate_by_day(records: &[LogRecord]) -> BTreeMap<NaiveDate, DailySummary> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();

    for record in records {
        let date = record.timestamp.date_naive();
        let day = days.entry(date).or_insert_with(|| DailySummary::new(date));

        match &record.kind {
            LogKind::Meal(meal) => day.consumption_logs.push(ConsumptionEntry {
                item: meal.description.clone(),
                notes: record.notes.clone(),
            }),
            LogKind::Water(water) => day.water_logs.push(WaterEntry {
                amount: water.amount,
                unit: "ml",
            }),
            LogKind::Feelings(rating) => day.record_feelings(*rating, record.timestamp),
        }
    }

    days
}

/// Aggregate and flatten to a date-ordered list, the form prompts embed
pub fn daily_summaries(records: &[LogRecord]) -> Vec<DailySummary> {
    aggregate_by_day(records).into_values().collect()
}
