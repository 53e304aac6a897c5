//! MCP tools for the diet diary
//!
//! Each tool takes typed parameters (their JSON schema is what `tools/list`
//! advertises) and either answers synchronously from the store or starts a
//! cancellable AI request.

pub mod coaching;
pub mod delete;
pub mod list;
pub mod log;
pub mod plan;

pub use coaching::*;
pub use delete::*;
pub use list::*;
pub use log::*;
pub use plan::*;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::domain::DomainError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A write failed; `message` is what the user sees
    #[error("{message}")]
    Save {
        message: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Failed to render result: {0}")]
    Render(#[from] serde_json::Error),
}

/// Arguments for tools that take none
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoParams {}

/// Decode a tool's argument object into its parameter struct
pub fn parse_arguments<P: DeserializeOwned>(arguments: Map<String, Value>) -> Result<P, ToolError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| ToolError::Arguments(e.to_string()))
}

/// RFC 3339 instant, e.g. `2024-06-01T08:30:00Z`
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidDate(format!("'{}' is not an RFC 3339 timestamp ({})", raw, e)))
}

/// Calendar date in `YYYY-MM-DD` form
pub fn parse_date(raw: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDate(format!("'{}' is not a YYYY-MM-DD date", raw)))
}

/// Pretty JSON for structured tool output
pub fn render_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
