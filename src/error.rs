//! Error types for Synheart Interact

use thiserror::Error;

/// Errors that can occur while capturing and normalizing interaction events
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to parse signal: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
