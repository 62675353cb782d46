//! Error types for the shapwise-core crate.

use thiserror::Error;

/// Top-level error type for explanation runs.
#[derive(Debug, Error)]
pub enum ShapError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model output arity mismatch: expected {expected} outputs, got {actual}")]
    OutputArity { expected: usize, actual: usize },

    #[error("Model returned {actual} predictions for {expected} inputs")]
    PredictionCount { expected: usize, actual: usize },

    #[error("Explanation interrupted: {0}")]
    Interrupted(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ShapError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn interrupted(msg: impl Into<String>) -> Self {
        Self::Interrupted(msg.into())
    }

    /// True for failures raised before any model call was scheduled.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }
}

impl From<tokio::task::JoinError> for ShapError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::interrupted("worker task was cancelled")
        } else {
            Self::interrupted(format!("worker task panicked: {err}"))
        }
    }
}
