//! Background installs and invocations.
//!
//! [`CapabilityService`] is what a front end talks to. It looks capabilities
//! up in the registry, hands installs to the orchestrator and invocations to
//! the entrypoints, and runs all of it on the [`TaskRunner`]. Tasks are keyed
//! by capability name, so an install and an invocation of the same
//! capability never overlap.

use std::sync::Arc;

use hybrid_core::CapabilityName;
use hybrid_packages::{
    CommandRunner, InstallOutcome, Orchestrator, PackageSpec, RUNTIME_CAPABILITY, RuntimeOutcome,
    UninstallOutcome,
};
use tracing::info;

use crate::capability::{CapabilityOutput, Invocation, InvocationContext};
use crate::error::{CapabilityError, CapabilityResult};
use crate::registry::CapabilityRegistry;
use crate::tasks::{TaskHandle, TaskRunner};

/// Registry, orchestrator and task runner behind one handle.
#[derive(Clone)]
pub struct CapabilityService {
    registry: Arc<CapabilityRegistry>,
    orchestrator: Arc<Orchestrator>,
    runner: Arc<dyn CommandRunner>,
    tasks: TaskRunner,
}

impl std::fmt::Debug for CapabilityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityService")
            .field("capabilities", &self.registry.len())
            .field("orchestrator", &self.orchestrator)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl CapabilityService {
    /// Create a service. `orchestrator` should serve
    /// [`CapabilityRegistry::requirement_table`].
    #[must_use]
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        orchestrator: Arc<Orchestrator>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            runner,
            tasks: TaskRunner::new(),
        }
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// The orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// The task runner.
    #[must_use]
    pub fn tasks(&self) -> &TaskRunner {
        &self.tasks
    }

    /// Missing packages of a registered capability.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name.
    pub fn missing_packages(&self, name: &CapabilityName) -> CapabilityResult<Vec<PackageSpec>> {
        self.registry.descriptor(name)?;
        Ok(self.orchestrator.missing_packages(name)?)
    }

    /// Whether a registered capability has all its packages.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name.
    pub fn is_installed(&self, name: &CapabilityName) -> CapabilityResult<bool> {
        Ok(self.missing_packages(name)?.is_empty())
    }

    /// Fail unless every package of `name` is present.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotInstalled`] listing the missing packages.
    pub fn require_installed(&self, name: &CapabilityName) -> CapabilityResult<()> {
        let missing = self.missing_packages(name)?;
        if missing.is_empty() {
            return Ok(());
        }
        Err(CapabilityError::NotInstalled {
            name: name.clone(),
            missing: missing.iter().map(|s| s.raw().to_string()).collect(),
        })
    }

    /// Context entrypoints run in.
    ///
    /// # Errors
    ///
    /// Returns an error if no interpreter is available.
    pub fn context(&self) -> CapabilityResult<InvocationContext> {
        let resolver = self.orchestrator.resolver();
        Ok(InvocationContext::new(
            resolver.runtime_interpreter()?,
            resolver.import_paths().clone(),
            Arc::clone(&self.runner),
        ))
    }

    /// Install `name` in the background.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name, or
    /// [`CapabilityError::Task`] if a task for it is still running.
    pub fn install(&self, name: &CapabilityName) -> CapabilityResult<TaskHandle<InstallOutcome>> {
        self.registry.descriptor(name)?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let target = name.clone();
        info!(capability = %name, "queueing install");
        Ok(self
            .tasks
            .spawn(name.as_str(), move || orchestrator.ensure_installed(&target))?)
    }

    /// Uninstall `name` in the background.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name, or
    /// [`CapabilityError::Task`] if a task for it is still running.
    pub fn uninstall(
        &self,
        name: &CapabilityName,
    ) -> CapabilityResult<TaskHandle<UninstallOutcome>> {
        self.registry.descriptor(name)?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let target = name.clone();
        info!(capability = %name, "queueing uninstall");
        Ok(self
            .tasks
            .spawn(name.as_str(), move || orchestrator.uninstall(&target))?)
    }

    /// Invoke `name` in the background with its declared options only.
    ///
    /// Does not check that the capability is installed; a missing package
    /// shows up as the entrypoint's error.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name, an error if
    /// no interpreter is available, or [`CapabilityError::Task`] if a task
    /// for it is still running.
    pub fn invoke(
        &self,
        name: &CapabilityName,
        invocation: Invocation,
    ) -> CapabilityResult<TaskHandle<CapabilityOutput>> {
        self.registry.descriptor(name)?;
        let ctx = self.context()?;
        let registry = Arc::clone(&self.registry);
        let target = name.clone();
        info!(capability = %name, "queueing invocation");
        Ok(self
            .tasks
            .spawn(name.as_str(), move || registry.invoke(&target, &ctx, &invocation))?)
    }

    /// Provision the numerical runtime in the background.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Task`] if provisioning is already running.
    pub fn provision_runtime(&self) -> CapabilityResult<TaskHandle<RuntimeOutcome>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let runner = Arc::clone(&self.runner);
        Ok(self.tasks.spawn(RUNTIME_CAPABILITY, move || {
            orchestrator.provision_runtime(runner.as_ref())
        })?)
    }
}
