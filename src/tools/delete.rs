//! Tools for removing diary entries
//!
//! A delete only goes ahead when the caller passes `confirm: true`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{LogId, UserId, WeightId};
use crate::storage::LogStore;
use crate::tools::ToolError;

/// Parameters for deleting a log
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteLogParams {
    pub log_id: String,
    /// Must be true; the log is gone for good
    #[serde(default)]
    pub confirm: bool,
}

/// Parameters for deleting a weight entry
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteWeightParams {
    pub weight_id: String,
    /// Must be true; the entry is gone for good
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

fn require_confirmation(confirm: bool, what: &str) -> Result<(), ToolError> {
    if confirm {
        return Ok(());
    }
    Err(ToolError::Invalid(format!(
        "Are you sure you want to delete this {}? Call again with confirm: true to delete it.",
        what
    )))
}

pub fn delete_log<S: LogStore + ?Sized>(
    store: &S,
    user: &UserId,
    params: DeleteLogParams,
) -> Result<DeleteResponse, ToolError> {
    require_confirmation(params.confirm, "log")?;
    let log_id = LogId::from_string(&params.log_id)
        .map_err(|_| ToolError::Invalid(format!("Invalid log ID '{}'", params.log_id)))?;

    store.delete_log(user, &log_id)?;

    Ok(DeleteResponse {
        success: true,
        message: format!("Deleted log {}.", log_id),
    })
}

pub fn delete_weight<S: LogStore + ?Sized>(
    store: &S,
    user: &UserId,
    params: DeleteWeightParams,
) -> Result<DeleteResponse, ToolError> {
    require_confirmation(params.confirm, "weight entry")?;
    let weight_id = WeightId::from_string(&params.weight_id)
        .map_err(|_| ToolError::Invalid(format!("Invalid weight ID '{}'", params.weight_id)))?;

    store.delete_weight(user, &weight_id)?;

    Ok(DeleteResponse {
        success: true,
        message: format!("Deleted weight entry {}.", weight_id),
    })
}
