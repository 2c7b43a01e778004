//! Error types for webdict-core.
//!
//! Every failure that can reach a protocol client maps onto an SRU diagnostic
//! code, so the endpoint can report it through its diagnostics sink.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::DiagnosticCodes;

/// Main error type for the webdict engine.
#[derive(Debug, Error)]
pub enum WebdictError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Query construction errors
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    // Protocol errors
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported index in query: {0}")]
    UnsupportedIndex(String),

    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    // Document errors
    #[error("XML error: {message}")]
    Xml { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for webdict operations.
pub type Result<T> = std::result::Result<T, WebdictError>;

impl From<std::io::Error> for WebdictError {
    fn from(err: std::io::Error) -> Self {
        WebdictError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for WebdictError {
    fn from(err: serde_json::Error) -> Self {
        WebdictError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for WebdictError {
    fn from(err: rusqlite::Error) -> Self {
        WebdictError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl WebdictError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        WebdictError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to an SRU diagnostic code.
    ///
    /// - 1: General system error (store failure, configuration, IO)
    /// - 4: Unsupported operation
    /// - 10: Query syntax error
    /// - 16: Unsupported index
    pub fn to_diagnostic_code(&self) -> u32 {
        match self {
            WebdictError::UnsupportedOperation(_) => DiagnosticCodes::UNSUPPORTED_OPERATION,
            WebdictError::QuerySyntax(_) => DiagnosticCodes::QUERY_SYNTAX_ERROR,
            WebdictError::UnsupportedIndex(_) => DiagnosticCodes::UNSUPPORTED_INDEX,
            _ => DiagnosticCodes::GENERAL_SYSTEM_ERROR,
        }
    }

    /// Check if this error came from the relational store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, WebdictError::Database { .. })
    }
}
