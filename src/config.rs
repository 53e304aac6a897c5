//! Runtime configuration shared by the server and the AI client

use std::path::PathBuf;

pub const DEFAULT_APP_ID: &str = "diet-coach";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Everything needed to start a server
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub database: PathBuf,
    /// Partitions all stored data, so several deployments can share a file
    pub app_id: String,
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    /// Extra attempts after the first for 429 and 5xx replies
    pub max_retries: u32,
    /// First backoff delay; doubled after every retry
    pub initial_delay_ms: u64,
    /// Overall HTTP timeout per attempt, none by default
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Defaults for everything except the database location
    pub fn new(database: PathBuf) -> Self {
        Self {
            database,
            app_id: DEFAULT_APP_ID.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_retries: 3,
            initial_delay_ms: 1000,
            request_timeout_secs: None,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
