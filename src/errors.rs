// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every failure the HTTP layer can produce is normalised into one of these
//! variants before it reaches the poller or the reconciler.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Network failure or request timeout reaching the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a body we could not decode.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-2xx response other than 404, with the normalised server message.
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Attempt to register a task id that is already tracked.
    #[error("Task already tracked: {0}")]
    DuplicateTask(String),

    #[error("Retry not allowed for failed task {0}")]
    RetryNotAllowed(String),

    /// The failed-tasks feature is not deployed on this backend.
    #[error("Endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Permanent error: {0}")]
    Permanent(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Whether the operation that produced this error is safe to repeat as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackerError::Transport(_) | TrackerError::Decode(_) | TrackerError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TrackerError::Decode(err.to_string())
        } else if err.is_timeout() {
            TrackerError::Transport(format!("request timed out: {err}"))
        } else {
            TrackerError::Transport(err.to_string())
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TrackerError>;
