//! SQLite implementation of the log store
//!
//! A single connection sits behind a mutex. Writes publish a fresh snapshot
//! to the affected user's listeners once the connection lock is released,
//! so a listener may safely read the store again.
//! Snapshot reads and deliveries of one collection are serialized, so
//! listeners always see snapshots in the order they were read.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::{Session, SessionStore};
use crate::domain::{LogDraft, LogId, LogKind, LogRecord, UserId, WeightDraft, WeightId, WeightRecord};
use crate::storage::subscription::Registry;
use crate::storage::{migrations, LogStore, SnapshotCallback, StorageError, Subscription};

/// SQLite-backed store for one application id
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    app_id: String,
    log_listeners: Arc<Registry<LogRecord>>,
    weight_listeners: Arc<Registry<WeightRecord>>,
}

impl SqliteStorage {
    /// Open (or create) the database file and bring the schema up to date
    pub fn new(db_path: PathBuf, app_id: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open(&db_path)
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;

        let storage = Self::from_connection(conn, app_id)?;
        tracing::info!("SQLite storage initialized at: {:?}", db_path);
        Ok(storage)
    }

    /// Private in-memory database, mainly for tests
    pub fn in_memory(app_id: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn, app_id)
    }

    fn from_connection(conn: Connection, app_id: impl Into<String>) -> Result<Self, StorageError> {
        migrations::initialize_database(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            app_id: app_id.into(),
            log_listeners: Registry::new(),
            weight_listeners: Registry::new(),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Connection("database lock poisoned".to_string()))
    }

    /// Fixed-width RFC 3339 so that text order equals time order
    fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(column: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
    }

    /// The instant that will be stored, truncated to what the column keeps
    fn stamp(timestamp: Option<DateTime<Utc>>) -> DateTime<Utc> {
        timestamp.unwrap_or_else(Utc::now).trunc_subsecs(6)
    }

    fn log_from_row(row: &rusqlite::Row<'_>) -> Result<LogRecord, rusqlite::Error> {
        let id_str: String = row.get(0)?;
        let id = LogId::from_string(&id_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        let timestamp_str: String = row.get(1)?;
        let timestamp = Self::parse_timestamp(1, &timestamp_str)?;

        let details: String = row.get(3)?;
        let kind: LogKind = serde_json::from_str(&details)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        Ok(LogRecord::from_existing(id, timestamp, row.get(2)?, kind))
    }

    fn weight_from_row(row: &rusqlite::Row<'_>) -> Result<WeightRecord, rusqlite::Error> {
        let id_str: String = row.get(0)?;
        let id = WeightId::from_string(&id_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        let timestamp_str: String = row.get(2)?;
        let timestamp = Self::parse_timestamp(2, &timestamp_str)?;

        Ok(WeightRecord::from_existing(id, row.get(1)?, timestamp))
    }

    /// Push the user's current log snapshot to their listeners
    fn publish_logs(&self, user: &UserId) {
        let _delivery = self.log_listeners.deliver();
        let listeners = self.log_listeners.listeners_for(user);
        if listeners.is_empty() {
            return;
        }
        match self.list_logs(user) {
            Ok(snapshot) => {
                for listener in listeners {
                    listener(snapshot.clone());
                }
            }
            Err(e) => tracing::warn!("Failed to refresh log snapshot for listeners: {}", e),
        }
    }

    /// Push the user's current weight snapshot to their listeners
    fn publish_weights(&self, user: &UserId) {
        let _delivery = self.weight_listeners.deliver();
        let listeners = self.weight_listeners.listeners_for(user);
        if listeners.is_empty() {
            return;
        }
        match self.list_weights(user) {
            Ok(snapshot) => {
                for listener in listeners {
                    listener(snapshot.clone());
                }
            }
            Err(e) => tracing::warn!("Failed to refresh weight snapshot for listeners: {}", e),
        }
    }
}

impl LogStore for SqliteStorage {
    fn create_log(&self, user: &UserId, draft: LogDraft) -> Result<LogRecord, StorageError> {
        draft.validate()?;

        let record = LogRecord::from_existing(LogId::new(), Self::stamp(draft.timestamp), draft.notes, draft.kind);
        let details = serde_json::to_string(&record.kind)?;

        self.conn()?.execute(
            "INSERT INTO logs (id, app_id, user_id, kind, timestamp, notes, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                self.app_id,
                user.to_string(),
                record.kind.name(),
                Self::format_timestamp(&record.timestamp),
                record.notes,
                details
            ],
        )?;

        tracing::debug!("Created {} log {}", record.kind.name(), record.id);
        self.publish_logs(user);
        Ok(record)
    }

    fn delete_log(&self, user: &UserId, log_id: &LogId) -> Result<(), StorageError> {
        let rows_affected = self.conn()?.execute(
            "DELETE FROM logs WHERE id = ?1 AND app_id = ?2 AND user_id = ?3",
            params![log_id.to_string(), self.app_id, user.to_string()],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::LogNotFound {
                log_id: log_id.to_string(),
            });
        }

        tracing::debug!("Deleted log {}", log_id);
        self.publish_logs(user);
        Ok(())
    }

    fn list_logs(&self, user: &UserId) -> Result<Vec<LogRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, notes, details
             FROM logs WHERE app_id = ?1 AND user_id = ?2
             ORDER BY timestamp DESC, rowid DESC",
        )?;

        let logs = stmt
            .query_map(params![self.app_id, user.to_string()], Self::log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    fn subscribe_logs(
        &self,
        user: &UserId,
        on_change: SnapshotCallback<LogRecord>,
    ) -> Result<Subscription, StorageError> {
        let _delivery = self.log_listeners.deliver();
        let subscription = self.log_listeners.add(user, on_change.clone());
        let snapshot = self.list_logs(user)?;
        on_change(snapshot);
        Ok(subscription)
    }

    fn create_weight(&self, user: &UserId, draft: WeightDraft) -> Result<WeightRecord, StorageError> {
        draft.validate()?;

        let record = WeightRecord::from_existing(WeightId::new(), draft.weight, Self::stamp(draft.timestamp));

        self.conn()?.execute(
            "INSERT INTO weight_logs (id, app_id, user_id, weight, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                self.app_id,
                user.to_string(),
                record.weight,
                Self::format_timestamp(&record.timestamp)
            ],
        )?;

        tracing::debug!("Created weight log {} ({})", record.id, record.weight);
        self.publish_weights(user);
        Ok(record)
    }

    fn delete_weight(&self, user: &UserId, weight_id: &WeightId) -> Result<(), StorageError> {
        let rows_affected = self.conn()?.execute(
            "DELETE FROM weight_logs WHERE id = ?1 AND app_id = ?2 AND user_id = ?3",
            params![weight_id.to_string(), self.app_id, user.to_string()],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::WeightNotFound {
                weight_id: weight_id.to_string(),
            });
        }

        tracing::debug!("Deleted weight log {}", weight_id);
        self.publish_weights(user);
        Ok(())
    }

    fn list_weights(&self, user: &UserId) -> Result<Vec<WeightRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, weight, timestamp
             FROM weight_logs WHERE app_id = ?1 AND user_id = ?2
             ORDER BY timestamp ASC, rowid ASC",
        )?;

        let weights = stmt
            .query_map(params![self.app_id, user.to_string()], Self::weight_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(weights)
    }

    fn subscribe_weights(
        &self,
        user: &UserId,
        on_change: SnapshotCallback<WeightRecord>,
    ) -> Result<Subscription, StorageError> {
        let _delivery = self.weight_listeners.deliver();
        let subscription = self.weight_listeners.add(user, on_change.clone());
        let snapshot = self.list_weights(user)?;
        on_change(snapshot);
        Ok(subscription)
    }
}

impl SessionStore for SqliteStorage {
    fn current_session(&self) -> Result<Option<Session>, StorageError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT user_id, created_at FROM sessions WHERE app_id = ?1",
                params![self.app_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((user_id, created_at)) = row else {
            return Ok(None);
        };

        let user_id = UserId::from_string(&user_id).map_err(|e| StorageError::Corrupt {
            table: "sessions",
            reason: e.to_string(),
        })?;
        let created_at = Self::parse_timestamp(1, &created_at)?;

        Ok(Some(Session { user_id, created_at }))
    }

    fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO sessions (app_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                self.app_id,
                session.user_id.to_string(),
                Self::format_timestamp(&session.created_at)
            ],
        )?;
        Ok(())
    }

    fn remove_session(&self, user: &UserId) -> Result<(), StorageError> {
        self.conn()?.execute(
            "DELETE FROM sessions WHERE app_id = ?1 AND user_id = ?2",
            params![self.app_id, user.to_string()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn storage() -> SqliteStorage {
        SqliteStorage::in_memory("test-app").unwrap()
    }

    #[test]
    fn test_logs_listed_newest_first() {
        let store = storage();
        let user = UserId::new();
        let base = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();

        store.create_log(&user, LogDraft::water(250.0, "").unwrap().at(base)).unwrap();
        store
            .create_log(&user, LogDraft::meal("Chicken Salad", None, None, "").unwrap().at(base + Duration::hours(3)))
            .unwrap();
        store
            .create_log(&user, LogDraft::feelings(4, 4, 3, "").unwrap().at(base + Duration::hours(1)))
            .unwrap();

        let kinds: Vec<_> = store.list_logs(&user).unwrap().iter().map(|l| l.kind.name()).collect();
        assert_eq!(kinds, vec!["meal", "feelings", "water"]);
    }

    #[test]
    fn test_created_record_matches_listed_record() {
        let store = storage();
        let user = UserId::new();

        let created = store
            .create_log(&user, LogDraft::meal("Eggs & Avocado", Some("~400 kcal".into()), None, "quick").unwrap())
            .unwrap();

        assert_eq!(store.list_logs(&user).unwrap(), vec![created]);
    }

    #[test]
    fn test_partitions_are_isolated() {
        let store = storage();
        let alice = UserId::new();
        let bob = UserId::new();

        let log = store.create_log(&alice, LogDraft::water(300.0, "").unwrap()).unwrap();

        assert!(store.list_logs(&bob).unwrap().is_empty());
        assert!(matches!(
            store.delete_log(&bob, &log.id),
            Err(StorageError::LogNotFound { .. })
        ));
        assert_eq!(store.list_logs(&alice).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_draft_rejected_before_write() {
        let store = storage();
        let user = UserId::new();
        let draft = LogDraft {
            timestamp: None,
            notes: String::new(),
            kind: LogKind::Water(crate::domain::WaterDetails { amount: 0.0 }),
        };

        assert!(matches!(store.create_log(&user, draft), Err(StorageError::Invalid(_))));
        assert!(store.list_logs(&user).unwrap().is_empty());
    }

    #[test]
    fn test_subscription_receives_full_snapshots() {
        let store = storage();
        let user = UserId::new();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = store
            .subscribe_logs(&user, Arc::new(move |logs: Vec<LogRecord>| sink.lock().unwrap().push(logs.len())))
            .unwrap();

        let first = store.create_log(&user, LogDraft::water(250.0, "").unwrap()).unwrap();
        store.create_log(&user, LogDraft::water(500.0, "").unwrap()).unwrap();
        store.create_log(&UserId::new(), LogDraft::water(100.0, "").unwrap()).unwrap();
        store.delete_log(&user, &first.id).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 1]);

        subscription.unsubscribe();
        store.create_log(&user, LogDraft::water(750.0, "").unwrap()).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_subscriber_ends_on_latest_snapshot_despite_concurrent_writes() {
        let store = Arc::new(storage());
        let user = UserId::new();

        let writer = {
            let store = store.clone();
            let user = user.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    store.create_log(&user, LogDraft::water(100.0, "").unwrap()).unwrap();
                }
            })
        };

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store
            .subscribe_logs(&user, Arc::new(move |logs: Vec<LogRecord>| sink.lock().unwrap().push(logs.len())))
            .unwrap();

        writer.join().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&50));
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "snapshots went backwards: {:?}", seen);
    }

    #[test]
    fn test_weights_listed_oldest_first_and_deletable() {
        let store = storage();
        let user = UserId::new();
        let base = Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap();

        let later = store.create_weight(&user, WeightDraft::new(80.2).unwrap().at(base + Duration::days(2))).unwrap();
        let earlier = store.create_weight(&user, WeightDraft::new(81.0).unwrap().at(base)).unwrap();

        let weights = store.list_weights(&user).unwrap();
        assert_eq!(weights, vec![earlier.clone(), later]);

        store.delete_weight(&user, &earlier.id).unwrap();
        assert_eq!(store.list_weights(&user).unwrap().len(), 1);
        assert!(matches!(
            store.delete_weight(&user, &earlier.id),
            Err(StorageError::WeightNotFound { .. })
        ));
    }

    #[test]
    fn test_weight_subscription_sees_initial_snapshot() {
        let store = storage();
        let user = UserId::new();
        store.create_weight(&user, WeightDraft::new(79.5).unwrap()).unwrap();

        let seen: Arc<Mutex<Vec<Vec<f64>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store
            .subscribe_weights(
                &user,
                Arc::new(move |weights: Vec<WeightRecord>| {
                    sink.lock().unwrap().push(weights.iter().map(|w| w.weight).collect())
                }),
            )
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![vec![79.5]]);
    }

    #[test]
    fn test_session_round_trip() {
        let store = storage();
        assert!(store.current_session().unwrap().is_none());

        let session = Session {
            user_id: UserId::new(),
            created_at: Utc::now().trunc_subsecs(6),
        };
        store.save_session(&session).unwrap();
        assert_eq!(store.current_session().unwrap(), Some(session.clone()));

        store.remove_session(&session.user_id).unwrap();
        assert!(store.current_session().unwrap().is_none());
    }
}
