//! Error types for practiscope-core

use thiserror::Error;

/// Main error type for the practiscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required filter or body field is missing or malformed
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Referenced record or config does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A store query failed while building a report
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// A store query exceeded its time bound
    #[error("query timed out after {0}ms")]
    Timeout(u64),
}

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client supplied bad input
    Validation,
    /// Referenced entity is missing
    NotFound,
    /// Store query failed or timed out; no partial answer was produced
    Aggregation,
    /// Anything else (IO, config, serialization)
    Internal,
}

impl Error {
    /// Build a validation error for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Database(_) | Error::Aggregation(_) | Error::Timeout(_) => {
                ErrorKind::Aggregation
            }
            Error::Io(_) | Error::Json(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for practiscope-core
pub type Result<T> = std::result::Result<T, Error>;
