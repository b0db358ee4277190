#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the Hybrid runtime.
//!
//! Two independent stores live here:
//!
//! - [`Preferences`]: the user's `preferences.json` (autoplay, API port,
//!   output directory, UI language, debug logging).
//! - [`Catalog`]: capability metadata and the package requirement manifest.
//!   Both are embedded in the binary and can be overlaid per user from the
//!   home directory. A malformed entry is dropped on its own; the rest of the
//!   file still loads.
//!
//! # Overlay precedence
//!
//! 1. **User** (`~/.hybrid_tts/requirements.json`, `~/.hybrid_tts/capabilities.json`)
//! 2. **Embedded defaults** (compiled into the binary)
//!
//! A user entry replaces the bundled entry with the same capability name.

/// Capability metadata and requirement manifest.
pub mod catalog;
/// Configuration error types.
pub mod error;
/// Preferences store.
pub mod preferences;

pub use catalog::{Catalog, CapabilityMetadata, RejectedEntry};
pub use error::{ConfigError, ConfigResult};
pub use preferences::Preferences;
