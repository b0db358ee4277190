//! Hybrid Core - Foundation types shared by every Hybrid crate.
//!
//! This crate provides:
//! - The application home directory layout ([`HybridHome`])
//! - The validated capability identifier ([`CapabilityName`])

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod dirs;
pub mod name;

pub use dirs::HybridHome;
pub use name::{CapabilityName, NameError};
