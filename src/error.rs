//! Error types for podcast-archiver
//!
//! This module provides the error taxonomy of the sync pipeline:
//! - Source-level failures (`UpstreamUnavailable`, `ParseFailure`) that are isolated per source
//! - Entry-level failures (`DownloadUnavailable`) that degrade to the upstream link
//! - Storage failures that abort the current task invocation
//! - HTTP status code mapping and structured error bodies for the API

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for podcast-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for podcast-archiver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.compose_limit")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A source could not be reached or did not have its expected structure
    #[error("upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable {
        /// The source URL that failed
        url: String,
        /// What went wrong
        reason: String,
    },

    /// A source responded but its body could not be parsed as a feed
    #[error("failed to parse {url}: {reason}")]
    ParseFailure {
        /// The source URL that failed
        url: String,
        /// What went wrong
        reason: String,
    },

    /// No usable media representation could be obtained for an entry
    #[error("download unavailable for {link}: {reason}")]
    DownloadUnavailable {
        /// The entry's canonical link
        link: String,
        /// What went wrong
        reason: String,
    },

    /// Object storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found (subscription, media object)
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed validation (import records, API payloads)
    #[error("validation error: {0}")]
    Validation(String),

    /// A continuation task could not be handed to the task queue
    #[error("task dispatch failed: {0}")]
    TaskDispatch(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an `UpstreamUnavailable` error for a source URL
    pub fn upstream(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::UpstreamUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `ParseFailure` error for a source URL
    pub fn parse_failure(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ParseFailure {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `DownloadUnavailable` error for an entry link
    pub fn download_unavailable(link: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::DownloadUnavailable {
            link: link.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is scoped to a single source and must not abort a parse pass
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. } | Error::ParseFailure { .. } | Error::Network(_)
        )
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Object does not exist
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Compose called with more sources than the backend accepts
    #[error("compose of {count} objects exceeds fan-in limit {limit}")]
    FanInExceeded {
        /// Number of sources passed to compose
        count: usize,
        /// The backend's fan-in limit
        limit: usize,
    },

    /// Object path escapes the store root or is otherwise malformed
    #[error("invalid object path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Backend I/O failure
    #[error("backend failure on {path}: {reason}")]
    Backend {
        /// The object path being operated on
        path: String,
        /// The underlying failure
        reason: String,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: subscription 12",
///     "details": {
///       "resource": "subscription 12"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,
            Error::Storage(StorageError::ObjectNotFound(_)) => 404,
            Error::Storage(StorageError::InvalidPath { .. }) => 400,

            // 409 Conflict
            Error::Database(DatabaseError::ConstraintViolation(_)) => 409,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Storage(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::TaskDispatch(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream sources and media hosts
            Error::UpstreamUnavailable { .. } => 502,
            Error::ParseFailure { .. } => 502,
            Error::DownloadUnavailable { .. } => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::Database(DatabaseError::ConstraintViolation(_)) => "conflict",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
            Error::ParseFailure { .. } => "parse_failure",
            Error::DownloadUnavailable { .. } => "download_unavailable",
            Error::Storage(e) => match e {
                StorageError::ObjectNotFound(_) => "object_not_found",
                StorageError::FanInExceeded { .. } => "fan_in_exceeded",
                StorageError::InvalidPath { .. } => "invalid_path",
                StorageError::Backend { .. } => "storage_error",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::TaskDispatch(_) => "task_dispatch_error",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::UpstreamUnavailable { url, .. } | Error::ParseFailure { url, .. } => {
                Some(serde_json::json!({ "url": url }))
            }
            Error::DownloadUnavailable { link, .. } => Some(serde_json::json!({ "link": link })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Storage(StorageError::ObjectNotFound(path)) => {
                Some(serde_json::json!({ "path": path }))
            }
            Error::Storage(StorageError::FanInExceeded { count, limit }) => {
                Some(serde_json::json!({ "count": count, "limit": limit }))
            }
            Error::NotFound(resource) => Some(serde_json::json!({ "resource": resource })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
