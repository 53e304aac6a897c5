//! Anonymous authentication
//!
//! There are no credentials. Signing in yields a stable random user id per
//! application id, kept until the user signs out.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use crate::domain::UserId;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not signed in")]
    NotSignedIn,
}

/// An established anonymous identity
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Persistence for the one session an application id may hold
pub trait SessionStore: Send + Sync {
    fn current_session(&self) -> Result<Option<Session>, StorageError>;
    fn save_session(&self, session: &Session) -> Result<(), StorageError>;
    fn remove_session(&self, user: &UserId) -> Result<(), StorageError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn current_session(&self) -> Result<Option<Session>, StorageError> {
        (**self).current_session()
    }

    fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        (**self).save_session(session)
    }

    fn remove_session(&self, user: &UserId) -> Result<(), StorageError> {
        (**self).remove_session(user)
    }
}

pub struct AnonymousAuth<S> {
    store: S,
}

impl<S: SessionStore> AnonymousAuth<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resume the stored session, or start a new anonymous one
    pub fn sign_in(&self) -> Result<Session, AuthError> {
        if let Some(session) = self.store.current_session()? {
            tracing::debug!("Resumed anonymous session for {}", session.user_id);
            return Ok(session);
        }

        let session = Session {
            user_id: UserId::new(),
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.store.save_session(&session)?;
        tracing::info!("Signed in anonymously as {}", session.user_id);
        Ok(session)
    }

    /// Forget the identity; the next sign-in gets a fresh user id
    pub fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        match self.store.current_session()? {
            Some(current) if current.user_id == session.user_id => {
                self.store.remove_session(&session.user_id)?;
                tracing::info!("Signed out {}", session.user_id);
                Ok(())
            }
            _ => Err(AuthError::NotSignedIn),
        }
    }
}
