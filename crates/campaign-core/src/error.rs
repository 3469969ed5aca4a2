//! Error types for the engine

use thiserror::Error;

use crate::validation::ValidationIssue;

/// Result type alias using our custom EngineError type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has no active config yet (host programming error)
    #[error("Engine not configured: apply a config before triggering evaluations")]
    NotConfigured,

    /// A config document failed structural validation and was rejected
    #[error("Config rejected: {} validation error(s)", .0.len())]
    ConfigRejected(Vec<ValidationIssue>),

    /// Host message-scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Host storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Config fetch failure
    #[error("Config fetch error: {0}")]
    Fetch(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a Scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create a Storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a Fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
