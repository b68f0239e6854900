//! Error types for Synheart Gaze

use thiserror::Error;

/// Errors that can occur at the edges of the engine (parsing, configuration,
/// persistence). Per-frame metric and alert computation itself never fails.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse frame: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Insufficient landmarks: expected at least {expected}, got {actual}")]
    InsufficientLandmarks { expected: usize, actual: usize },

    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Frame timestamp {current} precedes previous frame {previous}")]
    NonMonotonicTimestamp { previous: String, current: String },

    #[error("Alert sink error: {0}")]
    SinkError(String),

    #[error("Invalid session state: {0}")]
    StateError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
