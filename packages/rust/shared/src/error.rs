//! Error types for CourseWatch.
//!
//! Library crates use [`CourseWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all CourseWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseWatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the LMS or an outbound service.
    #[error("network error: {0}")]
    Network(String),

    /// Timestamp, response body, or content parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Generative text completion failed (transport, API, or response shape).
    #[error("completion error: {0}")]
    Completion(String),

    /// Notification delivery failed.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// A run did not finish within its wall-clock cap.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, missing record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseWatchError>;

impl CourseWatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
