//! The signed-in user's live view of their diary
//!
//! Holds the latest log and weight snapshots, kept current by store
//! subscriptions for as long as the diary is open. Readers get a copy of
//! the snapshot; nothing here touches the database directly.

use std::sync::{Arc, Mutex};

use crate::auth::Session;
use crate::domain::{LogRecord, UserId, WeightRecord};
use crate::storage::{LogStore, StorageError, Subscription};

pub struct Diary {
    session: Session,
    logs: Arc<Mutex<Vec<LogRecord>>>,
    weights: Arc<Mutex<Vec<WeightRecord>>>,
    _subscriptions: Vec<Subscription>,
}

impl Diary {
    /// Subscribe to both collections for the session's user
    pub fn open<S: LogStore + ?Sized>(store: &S, session: Session) -> Result<Self, StorageError> {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let weights = Arc::new(Mutex::new(Vec::new()));

        let log_sink = logs.clone();
        let log_subscription = store.subscribe_logs(
            &session.user_id,
            Arc::new(move |snapshot: Vec<LogRecord>| replace(&log_sink, snapshot)),
        )?;

        let weight_sink = weights.clone();
        let weight_subscription = store.subscribe_weights(
            &session.user_id,
            Arc::new(move |snapshot: Vec<WeightRecord>| replace(&weight_sink, snapshot)),
        )?;

        tracing::debug!("Opened diary for {}", session.user_id);
        Ok(Self {
            session,
            logs,
            weights,
            _subscriptions: vec![log_subscription, weight_subscription],
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> &UserId {
        &self.session.user_id
    }

    /// Latest log snapshot, newest first
    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().map(|logs| logs.clone()).unwrap_or_default()
    }

    /// Latest weight snapshot, oldest first
    pub fn weights(&self) -> Vec<WeightRecord> {
        self.weights.lock().map(|weights| weights.clone()).unwrap_or_default()
    }
}

fn replace<T>(slot: &Mutex<Vec<T>>, snapshot: Vec<T>) {
    if let Ok(mut held) = slot.lock() {
        *held = snapshot;
    }
}
