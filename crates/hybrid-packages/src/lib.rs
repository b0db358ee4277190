//! Hybrid Packages - installing and tracking the packages capabilities need.
//!
//! This crate provides:
//! - Package specifier parsing and distribution-name normalization
//! - Isolated-environment detection and the dedicated environment
//! - Presence probes (distribution metadata first, import path second)
//! - `uv`/pip invocation with a self-healing pip bootstrap
//! - The append-only install log and the derived installed set
//! - The uninstall retention policy for packages shared between capabilities
//! - Numerical runtime provisioning
//!
//! The [`Orchestrator`] ties these together. It knows nothing about what a
//! capability does; it only sees a [`RequirementTable`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod command;
pub mod environment;
pub mod error;
pub mod installer;
pub mod log;
pub mod orchestrator;
pub mod probe;
pub mod requirement;
pub mod retention;
pub mod runtime;
pub mod spec;
pub mod state;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use environment::{EnvironmentMarkers, EnvironmentResolver, ImportPaths};
pub use error::{PackageError, PackageResult};
pub use installer::{InstallOptions, InstallerKind, PackageInstaller};
pub use log::{InstallAction, InstallLog, InstallLogEntry};
pub use orchestrator::{InstallOutcome, Orchestrator, UninstallOutcome};
pub use probe::{EnvironmentProbe, InterpreterProbe};
pub use requirement::{Requirement, RequirementTable};
pub use retention::{RetentionPlan, plan_removal};
pub use runtime::{
    CudaVersion, RUNTIME_CAPABILITY, RUNTIME_PACKAGES, RuntimeIndex, RuntimeOutcome,
};
pub use spec::{DistributionName, PackageSpec, SpecSource};
pub use state::InstallState;
