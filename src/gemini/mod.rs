//! Client for the generative-language API
//!
//! `executor` posts JSON and retries transient failures; `client` wraps
//! the `generateContent` envelope and pulls text or JSON back out.

pub mod client;
pub mod executor;

pub use client::*;
pub use executor::*;

use thiserror::Error;

/// Errors from talking to the AI endpoint
///
/// A retried request that finally gives up and a request rejected outright
/// both surface as `Http`; only the message tells them apart.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Response body was not valid JSON: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("No response text from AI.")]
    NoContent,

    #[error("AI did not return valid JSON: {0}")]
    MalformedJson(String),
}
