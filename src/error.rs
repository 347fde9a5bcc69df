// src/error.rs

//! Unified error handling for the monitor.
//!
//! `AppError` covers fatal, process-level failures (configuration,
//! credentials, opening the database). The per-stage errors below it are
//! recorded per target or per channel and never abort a run on their own.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML parsing failed
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Fingerprint store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Notification channel could not be constructed
    #[error("Notifier error: {0}")]
    Notifier(String),

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

    /// Create a notifier construction error.
    pub fn notifier(message: impl Into<String>) -> Self {
        Self::Notifier(message.into())
    }
}

/// Failure to retrieve a target's content.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    /// Connection or DNS failure
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Non-success status, only when error pages are not fingerprinted
    #[error("HTTP status {0}")]
    HttpError(u16),

    /// No response within the fetch timeout
    #[error("timed out")]
    Timeout,

    /// The target URL was rejected by the client
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be read
    #[error("failed to read body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else if let Some(status) = e.status() {
            Self::HttpError(status.as_u16())
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

/// Failure of the fingerprint store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database location could not be created or opened
    #[error("storage unavailable at {path}: {message}")]
    Unavailable { path: PathBuf, message: String },

    /// A query or write failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored timestamp could not be parsed back
    #[error("corrupt record for {target}: {message}")]
    Corrupt { target: String, message: String },

    /// Another thread panicked while holding the connection
    #[error("store lock poisoned")]
    Poisoned,

    /// The connection was already closed
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    pub fn unavailable(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Unavailable {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single notification channel.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeliveryError {
    /// The relay refused the credentials
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session could be established
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The server answered with a rejecting status code
    #[error("rejected by server with code {0}")]
    RejectedByServer(u16),

    /// No answer within the delivery timeout
    #[error("timed out")]
    Timeout,

    /// The message could not be built
    #[error("could not compose message: {0}")]
    Compose(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_serializes_with_kind() {
        let json = serde_json::to_value(FetchError::HttpError(503)).unwrap();
        assert_eq!(json["kind"], "http_error");
        assert_eq!(json["detail"], 503);

        let json = serde_json::to_value(FetchError::Timeout).unwrap();
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn storage_error_converts_into_app_error() {
        let err: AppError = StorageError::unavailable("/nope/db", "denied").into();
        assert!(matches!(err, AppError::Storage(StorageError::Unavailable { .. })));
        assert!(err.to_string().contains("/nope/db"));
    }

    #[test]
    fn delivery_error_display() {
        assert_eq!(
            DeliveryError::RejectedByServer(550).to_string(),
            "rejected by server with code 550"
        );
    }
}
