//! Hybrid Test - Shared test utilities for the Hybrid crates.
//!
//! This crate provides mock implementations and test helpers that can be
//! used across multiple Hybrid crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! hybrid-test.workspace = true
//! ```
//!
//! Then use in your integration tests:
//!
//! ```rust,ignore
//! use hybrid_test::{TestEnv, demo_table, test_name};
//!
//! #[test]
//! fn test_install() {
//!     let env = TestEnv::new(demo_table());
//!     env.orchestrator.ensure_installed(&test_name("demo")).unwrap();
//!     assert!(env.probe.has("foo"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
