//! Error types for console-bridge.

use thiserror::Error;

/// Result type alias using console-bridge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bridging the console and its evaluator.
#[derive(Error, Debug)]
pub enum Error {
    /// Evaluation of an input chunk failed
    #[error("{message}")]
    Evaluation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Boot script could not be produced or injected
    #[error("Boot script error: {0}")]
    BootScript(String),

    /// A script context initialization is already outstanding
    #[error("Script context initialization already in progress")]
    InitializationInProgress,

    /// The evaluator session is no longer accepting input
    #[error("Evaluator session closed")]
    SessionClosed,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
            source: None,
        }
    }

    /// Create an evaluation error with source.
    pub fn evaluation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Evaluation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a boot script error.
    pub fn boot_script(message: impl Into<String>) -> Self {
        Self::BootScript(message.into())
    }
}
