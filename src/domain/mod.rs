//! Domain module containing the diary records and their validation rules
//!
//! Logs (meal, water, feelings) and weights are the only persisted
//! entities; daily summaries are derived from logs on demand.

pub mod log;
pub mod summary;
pub mod types;
pub mod weight;

pub use log::*;
pub use summary::*;
pub use types::*;
pub use weight::*;

use thiserror::Error;

/// Errors raised while validating user input
///
/// The messages are shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Please describe your meal.")]
    EmptyMealDescription,

    #[error("{0}")]
    InvalidAmount(String),

    #[error("Invalid {field} rating {value}: ratings must be between 1 and 5")]
    InvalidRating { field: &'static str, value: u8 },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}
