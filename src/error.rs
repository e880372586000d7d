// src/error.rs

//! Unified error handling for the scanner.
//!
//! Each stage of a cycle has its own error type so the orchestrator can decide
//! what is recoverable: [`FetchError`] stays inside one adapter's turn,
//! [`NotifyError`] inside one listing, and [`StoreError`] is fatal at startup.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Identity store unavailable or not persistable
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client setup failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Failure of a single adapter's fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Adapter did not finish within its time budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Page did not have the expected structure
    #[error("unexpected page shape on {source_key}: {message}")]
    Shape { source_key: String, message: String },

    /// CSS selector could not be parsed
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Create an unexpected-page-shape error.
    pub fn shape(source_key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Shape {
            source_key: source_key.into(),
            message: message.to_string(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of the identity store's backing medium.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file unreadable or unwritable
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing file exists but does not decode
    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be encoded
    #[error("cannot encode store snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to deliver one message.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Credentials rejected; retrying will not help
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Transport asked us to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Network failure or server-side error
    #[error("transport error: {0}")]
    Transport(String),

    /// Message refused for a non-transient reason (bad chat, bad markup)
    #[error("message rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    /// Whether the notifier's retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }
}
