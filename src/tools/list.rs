//! Tools for reading the diary back
//!
//! Both tools answer from the live snapshots the diary keeps, so they see
//! exactly what the last store change published.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::diary::Diary;
use crate::domain::{aggregate_by_day, DailySummary, LogRecord, WeightRecord};
use crate::tools::{parse_date, ToolError};

/// Parameters for listing logs
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListLogsParams {
    /// Only logs from this UTC day (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<String>,
    /// Only logs of this kind: meal, water or feelings
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLogsResponse {
    pub logs: Vec<LogRecord>,
    /// Day totals when a single date was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<DaySummary>,
}

/// Counts shown alongside a single day's logs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub meals: usize,
    pub total_water_ml: f64,
    pub has_feelings: bool,
}

impl From<&DailySummary> for DaySummary {
    fn from(summary: &DailySummary) -> Self {
        Self {
            meals: summary.consumption_logs.len(),
            total_water_ml: summary.total_water_ml(),
            has_feelings: summary.feelings_log.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListWeightsResponse {
    pub weights: Vec<WeightRecord>,
}

/// Logs newest first, optionally narrowed to one day and/or kind
pub fn list_logs(diary: &Diary, params: ListLogsParams) -> Result<ListLogsResponse, ToolError> {
    let date = params.date.as_deref().map(parse_date).transpose()?;
    let kind = match params.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(kind @ ("meal" | "water" | "feelings")) => Some(kind.to_string()),
        Some(other) => {
            return Err(ToolError::Invalid(format!(
                "Unknown log kind '{}'. Valid kinds: meal, water, feelings",
                other
            )))
        }
    };

    let dated: Vec<LogRecord> = diary
        .logs()
        .into_iter()
        .filter(|log| date.map_or(true, |d| log.timestamp.date_naive() == d))
        .collect();

    // Day totals cover every kind, whatever the listing is narrowed to
    let day = date.map(|d| {
        aggregate_by_day(&dated)
            .get(&d)
            .map(DaySummary::from)
            .unwrap_or(DaySummary {
                meals: 0,
                total_water_ml: 0.0,
                has_feelings: false,
            })
    });

    let logs = dated
        .into_iter()
        .filter(|log| kind.as_deref().map_or(true, |k| log.kind.name() == k))
        .collect();

    Ok(ListLogsResponse { logs, day })
}

/// Weights oldest first, the order they are charted in
pub fn list_weights(diary: &Diary) -> ListWeightsResponse {
    ListWeightsResponse {
        weights: diary.weights(),
    }
}
