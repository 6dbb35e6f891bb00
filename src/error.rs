//! Error types for db-relay.
//!
//! Defines the fault taxonomy used by providers and the executor. Callers of
//! the executor never see these directly; they are collapsed into an
//! [`Envelope`](crate::envelope::Envelope) status and message.

use thiserror::Error;

/// Main error type for db-relay operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The provider could not hand back a usable connection (pool exhausted,
    /// host unreachable, auth failed, etc.)
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// The statement ran but the driver reported an error (syntax errors,
    /// constraint violations, connection lost mid-flight, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Returning or closing the connection failed after the outcome was decided.
    #[error("Release error: {0}")]
    Release(String),

    /// Anything else raised during an attempt.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// Configuration errors (invalid config file, unsupported URL scheme, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Creates an acquisition error with the given message.
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a release error with the given message.
    pub fn release(msg: impl Into<String>) -> Self {
        Self::Release(msg.into())
    }

    /// Creates an unexpected error with the given message.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Acquisition(_) => "Acquisition Error",
            Self::Execution(_) => "Execution Error",
            Self::Release(_) => "Release Error",
            Self::Unexpected(_) => "Unexpected Error",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Returns the driver-provided detail without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Acquisition(msg)
            | Self::Execution(msg)
            | Self::Release(msg)
            | Self::Unexpected(msg)
            | Self::Config(msg) => msg,
        }
    }
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;
