//! Error types for the Muse application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::track::Track;

/// Coarse classification of failures, used to decide how a failure is
/// surfaced and whether it rolls back a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad user input. Reported immediately, no state change.
    Validation,
    /// The generation backend failed or returned an unusable payload.
    /// Rolls back the pending entry and restores the prompt text.
    Backend,
    /// A sandbox round-trip did not complete in time. Never fatal.
    ChannelTimeout,
    /// The sandbox reported a rendering fault in already committed code.
    SandboxRuntime,
    /// Everything else (I/O, configuration, invariant violations).
    Internal,
}

/// A shared error type for the entire Muse application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MuseError {
    /// The submitted prompt was empty after trimming.
    #[error("Prompt is empty")]
    EmptyPrompt,

    /// The track needs an explicit model selection and none is set.
    #[error("No model selected for the {track} track")]
    NoModelSelected { track: Track },

    /// Truncation index outside `0..=len`.
    #[error("Index {index} is out of range for a history of {len} entries")]
    OutOfRange { index: i64, len: usize },

    /// A submission on this track is still in flight.
    #[error("A generation on the {track} track is already in progress")]
    AlreadyInProgress { track: Track },

    /// Non-success status or transport failure talking to the backend.
    #[error("Backend error: {message}")]
    Backend {
        status_code: Option<u16>,
        message: String,
    },

    /// The backend answered with text but without any image.
    #[error("No image generated. API returned text: {excerpt}...")]
    NoImageProduced { excerpt: String },

    /// The backend answered with nothing usable at all.
    #[error("No content received from API")]
    EmptyResponse,

    /// A sandbox round-trip exceeded its deadline.
    #[error("Sandbox did not answer {operation} within {timeout_ms} ms")]
    ChannelTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The sandbox channel is not attached or its instance has gone away.
    #[error("Sandbox channel unavailable: {0}")]
    ChannelClosed(String),

    /// The sandbox reported an `ERROR` event.
    #[error("Sandbox runtime error: {0}")]
    SandboxRuntime(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", "base64", ...
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MuseError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Backend error without an HTTP status.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status_code: None,
            message: message.into(),
        }
    }

    /// Creates a Backend error carrying the HTTP status code.
    pub fn backend_status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Classification
    // ============================================================================

    /// Maps the error onto the handling taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyPrompt
            | Self::NoModelSelected { .. }
            | Self::OutOfRange { .. }
            | Self::AlreadyInProgress { .. } => ErrorCategory::Validation,
            Self::Backend { .. } | Self::NoImageProduced { .. } | Self::EmptyResponse => {
                ErrorCategory::Backend
            }
            Self::ChannelTimeout { .. } | Self::ChannelClosed(_) => ErrorCategory::ChannelTimeout,
            Self::SandboxRuntime(_) => ErrorCategory::SandboxRuntime,
            Self::Io { .. }
            | Self::Serialization { .. }
            | Self::Config(_)
            | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Check if this is a backend error
    pub fn is_backend(&self) -> bool {
        self.category() == ErrorCategory::Backend
    }

    /// Check if this is a sandbox timeout or closed channel
    pub fn is_channel_timeout(&self) -> bool {
        self.category() == ErrorCategory::ChannelTimeout
    }

    /// Short notification title for this error.
    pub fn title(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "Prompt missing",
            Self::NoModelSelected { .. } => "Model missing",
            Self::OutOfRange { .. } => "Delete failed",
            Self::AlreadyInProgress { .. } => "Generation busy",
            Self::Backend { .. } | Self::NoImageProduced { .. } | Self::EmptyResponse => {
                "Generation error"
            }
            Self::ChannelTimeout { .. } | Self::ChannelClosed(_) => "Sandbox unavailable",
            Self::SandboxRuntime(_) => "3D Error",
            Self::Config(_) => "Config error",
            Self::Io { .. } | Self::Serialization { .. } | Self::Internal(_) => "Error",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for MuseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for MuseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for MuseError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for MuseError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, MuseError>`.
pub type Result<T> = std::result::Result<T, MuseError>;
