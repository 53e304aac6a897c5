//! Storage layer for diary logs and weights
//!
//! Every operation is scoped by the signed-in user. Lists are delivered as
//! full snapshots, both on request and through live subscriptions, never as
//! incremental diffs.

pub mod migrations;
pub mod sqlite;
pub mod subscription;

pub use sqlite::*;
pub use subscription::{SnapshotCallback, Subscription};

use thiserror::Error;

use crate::domain::{DomainError, LogDraft, LogId, LogRecord, UserId, WeightDraft, WeightId, WeightRecord};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(#[from] DomainError),

    #[error("Log not found: {log_id}")]
    LogNotFound { log_id: String },

    #[error("Weight entry not found: {weight_id}")]
    WeightNotFound { weight_id: String },

    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("Migration error: {0}")]
    Migration(String),
}

/// The document-store contract the rest of the crate relies on
///
/// Creates and deletes are independent single-record operations with no
/// cross-record transaction. Log snapshots are newest first; weight
/// snapshots are oldest first.
pub trait LogStore: Send + Sync {
    /// Store a validated log; the store assigns the id and, if the draft has
    /// none, the timestamp
    fn create_log(&self, user: &UserId, draft: LogDraft) -> Result<LogRecord, StorageError>;

    /// Remove a log by id
    fn delete_log(&self, user: &UserId, log_id: &LogId) -> Result<(), StorageError>;

    /// Current snapshot of the user's logs, newest first
    fn list_logs(&self, user: &UserId) -> Result<Vec<LogRecord>, StorageError>;

    /// Call `on_change` with the full log snapshot now and after every change
    fn subscribe_logs(
        &self,
        user: &UserId,
        on_change: SnapshotCallback<LogRecord>,
    ) -> Result<Subscription, StorageError>;

    /// Store a validated weight measurement
    fn create_weight(&self, user: &UserId, draft: WeightDraft) -> Result<WeightRecord, StorageError>;

    /// Remove a weight measurement by id
    fn delete_weight(&self, user: &UserId, weight_id: &WeightId) -> Result<(), StorageError>;

    /// Current snapshot of the user's weights, oldest first
    fn list_weights(&self, user: &UserId) -> Result<Vec<WeightRecord>, StorageError>;

    /// Call `on_change` with the full weight snapshot now and after every change
    fn subscribe_weights(
        &self,
        user: &UserId,
        on_change: SnapshotCallback<WeightRecord>,
    ) -> Result<Subscription, StorageError>;
}
