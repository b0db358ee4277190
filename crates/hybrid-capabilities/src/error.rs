//! Capability and task error types.

use hybrid_core::CapabilityName;
use hybrid_packages::PackageError;

/// Errors from looking up and invoking capabilities.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// No descriptor is registered under this name.
    #[error("capability not found: {0}")]
    NotFound(CapabilityName),

    /// A descriptor with this name is already registered.
    #[error("capability already registered: {0}")]
    AlreadyRegistered(CapabilityName),

    /// The capability's packages are not all present.
    #[error("capability {name} is not installed (missing: {})", .missing.join(", "))]
    NotInstalled {
        /// Capability name.
        name: CapabilityName,
        /// Missing package specifiers.
        missing: Vec<String>,
    },

    /// The entrypoint ran but reported failure.
    #[error("{capability} failed: {message}")]
    InvocationFailed {
        /// Capability name.
        capability: CapabilityName,
        /// Error reported by the entrypoint, or its stderr.
        message: String,
    },

    /// The entrypoint finished but its result could not be understood.
    #[error("invalid output from {capability}: {reason}")]
    InvalidOutput {
        /// Capability name.
        capability: CapabilityName,
        /// What was wrong.
        reason: String,
    },

    /// Output directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment or package failure.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The task could not be started.
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Errors delivered by the background task runner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// A task with the same key is still running.
    #[error("a task for {0} is already running")]
    AlreadyRunning(String),

    /// The worker thread could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(String),

    /// The work returned an error.
    #[error("{0}")]
    Failed(String),

    /// The work panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The worker went away without reporting.
    #[error("worker exited without reporting a result")]
    Lost,
}
