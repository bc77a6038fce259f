//! Error types for ostor-usage
//!
//! This module defines the error types used throughout the ostor-usage crates.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use ostor_usage_core::error::{Result, UsageError};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to UsageError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for ostor-usage operations
///
/// Only listing failures and configuration problems ever reach the caller of
/// a run; everything else is logged and counted where it happens.
#[derive(Error, Debug)]
pub enum UsageError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The admin API answered with a non-success status
    #[error("HTTP error: status {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Decoded error message from the response body
        message: String,
    },

    /// The admin API answered with something other than the expected JSON
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A fetched usage document could not be interpreted
    #[error("Malformed usage document for {object}: {reason}")]
    MalformedDocument {
        /// The usage object the document belongs to
        object: String,
        /// What was wrong with it
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The worker permit pool was closed while tasks were still queued
    #[error("Concurrency pool closed: {0}")]
    PoolClosed(String),
}

/// Convenience type alias for Results in ostor-usage
///
/// # Example
///
/// ```
/// use ostor_usage_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = UsageError::Http {
            status: 403,
            message: "AccessDenied: Access Denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "HTTP error: status 403: AccessDenied: Access Denied"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let usage_error: UsageError = io_error.into();
        assert!(matches!(usage_error, UsageError::Io(_)));
    }

    #[test]
    fn test_malformed_document_display() {
        let error = UsageError::MalformedDocument {
            object: "usage-2024-01-01T00:00:00Z".to_string(),
            reason: "document is not a JSON object".to_string(),
        };
        assert!(error.to_string().contains("usage-2024-01-01T00:00:00Z"));
    }
}
