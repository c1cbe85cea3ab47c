//! Error types for agent operations
//!
//! One top-level taxonomy. Transport, decode, transfer, install, and sensor
//! failures are fatal and propagate here; stale chunk responses and unknown
//! topics are not errors and never reach this module.

use thiserror::Error;

/// Main error type for agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Attribute decode error: {0}")]
    Decode(#[from] crate::protocol::DecodeError),

    #[error("Firmware transfer error: {0}")]
    Transfer(#[from] crate::agent::TransferError),

    #[error("Firmware install error: {0}")]
    Install(#[from] crate::agent::InstallError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] crate::sensor::SensorError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// Wrap a failure from any `Transport` implementation's error type.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
