//! Hybrid Telemetry - Logging for the Hybrid installer and runner.
//!
//! This crate provides:
//! - Configurable `tracing` subscriber setup (stderr or rolling files)
//! - A [`Stopwatch`] that reports how long a piece of work took
//!
//! # Example
//!
//! ```rust,no_run
//! use hybrid_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hybrid_telemetry::TelemetryError> {
//! let config = LogConfig::for_verbosity(1, false)
//!     .with_format(LogFormat::Compact)
//!     .with_directive("hybrid_packages=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;
mod timer;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileRotation, LogConfig, LogFormat, LogTarget, setup_logging};
pub use timer::{Stopwatch, format_secs};
