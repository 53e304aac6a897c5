/// Public library interface for the Diet Coach MCP server
///
/// This module exports the server together with the diary, storage and
/// coaching layers so they can be used by other applications or tests.

use std::sync::Arc;

use thiserror::Error;

pub mod auth;
pub mod coach;
pub mod config;
pub mod diary;
pub mod domain;
pub mod gemini;
pub mod mcp;
pub mod prompts;
pub mod storage;
pub mod tools;

pub use auth::{AnonymousAuth, AuthError, Session};
pub use coach::Coach;
pub use config::Config;
pub use diary::Diary;
pub use domain::*;
pub use gemini::{AiError, GeminiClient};
pub use storage::{LogStore, SqliteStorage, StorageError};

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] StorageError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("AI client error: {0}")]
    Ai(#[from] AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main diet coach server that implements the MCP protocol
///
/// Owns the store, the anonymous session and the live diary of the
/// signed-in user, plus the AI coach used by the analysis tools.
pub struct DietCoachServer {
    storage: Arc<SqliteStorage>,
    auth: AnonymousAuth<Arc<SqliteStorage>>,
    coach: Coach,
    diary: Diary,
}

impl DietCoachServer {
    /// Open the database, sign in and build the Gemini-backed coach
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        tracing::info!("Initializing Diet Coach server with database: {:?}", config.database);

        if !config.has_api_key() {
            tracing::warn!("No Gemini API key configured; AI tools will fail until one is set");
        }

        let storage = Arc::new(SqliteStorage::new(config.database.clone(), &config.app_id)?);
        let client = GeminiClient::from_config(&config)?;
        Self::with_coach(storage, Coach::new(client))
    }

    /// Build a server around an existing store and coach
    pub fn with_coach(storage: Arc<SqliteStorage>, coach: Coach) -> Result<Self, ServerError> {
        let auth = AnonymousAuth::new(storage.clone());
        let session = auth.sign_in()?;
        let diary = Diary::open(storage.as_ref(), session)?;

        Ok(Self {
            storage,
            auth,
            coach,
            diary,
        })
    }

    /// Run the MCP server, handling JSON-RPC requests over stdin/stdout
    ///
    /// This method will block until stdin closes or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            "Server started for {}, {} existing logs",
            self.diary.user_id(),
            self.diary.logs().len()
        );

        let mut mcp_server = mcp::McpServer::new(self);
        mcp_server.run().await
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn coach(&self) -> &Coach {
        &self.coach
    }

    pub fn diary(&self) -> &Diary {
        &self.diary
    }

    /// End the current anonymous session and start a fresh one
    ///
    /// The old diary's subscriptions end; data of the old user stays in the
    /// database but is no longer reachable.
    pub fn sign_out(&mut self) -> Result<Session, AuthError> {
        self.auth.sign_out(self.diary.session())?;
        let session = self.auth.sign_in()?;
        self.diary = Diary::open(self.storage.as_ref(), session.clone())?;
        Ok(session)
    }
}
