//! Error types for the calblock ecosystem.

use thiserror::Error;

/// Errors that can occur in calblock operations.
#[derive(Error, Debug)]
pub enum CalBlockError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed fetch error: {0}")]
    FeedFetch(String),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Event '{uid}' has unusable times: {reason}")]
    EventParse { uid: String, reason: String },

    #[error("Actuator failed for '{item}': {reason}")]
    Actuator { item: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calblock operations.
pub type CalBlockResult<T> = Result<T, CalBlockError>;
