//! Hybrid Capabilities - what each optional capability is and how it runs.
//!
//! This crate provides:
//! - [`CapabilityDescriptor`]s and the read-only [`CapabilityRegistry`]
//! - The [`Capability`] trait and the Python-backed [`PythonEntrypoint`]
//! - Option filtering against a descriptor's declared features
//! - Output file naming
//! - The background [`TaskRunner`], with per-capability single-flight
//! - [`CapabilityService`], which runs installs and invocations as tasks
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_capabilities::{CapabilityService, Invocation};
//!
//! let handle = service.install(&name)?;
//! let done = handle.wait().await;
//! if done.is_ok() {
//!     let output = service.invoke(&name, Invocation::text("Hello"))?.wait().await;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod builtin;
pub mod capability;
pub mod descriptor;
pub mod error;
pub mod naming;
pub mod python;
pub mod registry;
pub mod service;
pub mod tasks;

pub use builtin::builtin_descriptors;
pub use capability::{
    Capability, CapabilityOutput, Invocation, InvocationContext, InvocationInput,
    InvocationOptions,
};
pub use descriptor::{CapabilityDescriptor, Category, Feature};
pub use error::{CapabilityError, CapabilityResult, TaskError};
pub use naming::{base_filename, create_base_filename, date_stamp};
pub use python::PythonEntrypoint;
pub use registry::CapabilityRegistry;
pub use service::CapabilityService;
pub use tasks::{TaskCompletion, TaskHandle, TaskRunner, TaskState};
