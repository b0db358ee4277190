//! Errors raised while loading or saving configuration files.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON or has the wrong shape.
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// File (or embedded source label) that failed.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A value was rejected by validation.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// Key or field that was rejected.
        field: String,
        /// Human-readable reason.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
