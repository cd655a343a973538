//! # Application Error Types
//!
//! This module defines the error types used throughout the record lookup bot.
//! `LookupError` covers the data path (query validation, document fetching,
//! decoding); `AppError` is the application-wide error used by configuration
//! and startup code.

use std::fmt;

/// Remote document a source failure concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Manifest,
    Shard,
}

impl DocumentKind {
    /// Metric and log label
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Manifest => "manifest",
            DocumentKind::Shard => "shard",
        }
    }
}

/// Errors produced while resolving a lookup query
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// The query cannot be used as a lookup key (too few digits, empty, ...)
    InvalidQuery(String),
    /// A backing document could not be located, fetched or decompressed
    SourceUnavailable(DocumentKind, String),
    /// A backing document was fetched but its content is malformed
    ParseError(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::InvalidQuery(msg) => write!(f, "[INVALID_QUERY] {}", msg),
            LookupError::SourceUnavailable(kind, msg) => {
                write!(f, "[SOURCE_UNAVAILABLE] {}: {}", kind.label(), msg)
            }
            LookupError::ParseError(msg) => write!(f, "[PARSE_ERROR] {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::ParseError(err.to_string())
    }
}

impl LookupError {
    /// `SourceUnavailable` for `kind` from any displayable cause
    pub fn unavailable(kind: DocumentKind, cause: impl fmt::Display) -> Self {
        LookupError::SourceUnavailable(kind, cause.to_string())
    }
}

/// Result type alias for the lookup path
pub type LookupResult<T> = Result<T, LookupError>;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (user input, commands)
    Validation(String),
    /// Lookup and data source errors
    Lookup(String),
    /// File system errors
    FileSystem(String),
    /// Network/communication errors
    Network(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Lookup(msg) => write!(f, "[LOOKUP] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Network(msg) => write!(f, "[NETWORK] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LookupError> for AppError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::InvalidQuery(msg) => AppError::Validation(msg),
            other => AppError::Lookup(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<teloxide::RequestError> for AppError {
    fn from(err: teloxide::RequestError) -> Self {
        AppError::Network(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log lookup failures with query context.
    ///
    /// Only the digit count of the query is logged, never the query itself.
    pub fn log_lookup_error(
        error: &impl std::fmt::Display,
        operation: &str,
        user_id: Option<i64>,
        shard_id: Option<&str>,
        query_digits: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            user_id = ?user_id,
            shard_id = ?shard_id,
            query_digits = ?query_digits,
            "Lookup failed"
        );
    }

    /// Log network/communication errors with connection context
    pub fn log_network_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
        attempt_count: Option<u32>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            attempt_count = ?attempt_count,
            "Network operation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
