//! Package management error types.

use std::path::PathBuf;

use hybrid_core::CapabilityName;

/// Errors from environment, install and log operations.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// No requirement entry exists for this capability.
    #[error("unknown capability: {0}")]
    UnknownCapability(CapabilityName),

    /// The package manager exited non-zero while installing.
    #[error("install failed (exit {exit}): {command}\n{stderr}", exit = display_code(.code))]
    InstallFailed {
        /// Command line that was run.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The package manager exited non-zero while uninstalling.
    #[error("uninstall failed (exit {exit}): {command}\n{stderr}", exit = display_code(.code))]
    UninstallFailed {
        /// Command line that was run.
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// A subprocess could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No usable interpreter, or the dedicated environment could not be created.
    #[error("environment error: {0}")]
    Environment(String),

    /// The install log could not be read or written.
    #[error("install log error at {path}: {source}")]
    Log {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[allow(clippy::ref_option)]
fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Result type for package operations.
pub type PackageResult<T> = Result<T, PackageError>;
