//! Install, uninstall and reconciliation.
//!
//! The [`Orchestrator`] owns the install log and the [`InstallState`] and is
//! the only thing that changes either. Every action writes its log line
//! first and updates the in-memory set only once the write has succeeded.

use std::collections::BTreeSet;
use std::sync::Arc;

use hybrid_core::CapabilityName;
use tracing::{debug, info, warn};

use crate::environment::EnvironmentResolver;
use crate::error::{PackageError, PackageResult};
use crate::installer::{InstallOptions, PackageInstaller};
use crate::log::{InstallAction, InstallLog, InstallLogEntry};
use crate::probe::EnvironmentProbe;
use crate::requirement::{Requirement, RequirementTable};
use crate::retention::plan_removal;
use crate::spec::PackageSpec;
use crate::state::InstallState;

/// Result of [`Orchestrator::ensure_installed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Every package was already present; nothing ran.
    AlreadySatisfied,
    /// These packages were missing and have been installed.
    Installed(Vec<PackageSpec>),
}

/// Result of [`Orchestrator::uninstall`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallOutcome {
    /// Packages that were uninstalled.
    pub removed: Vec<PackageSpec>,
    /// Packages kept because another installed capability declares them.
    pub retained: Vec<PackageSpec>,
}

/// Drives installs and uninstalls for the capabilities in a [`RequirementTable`].
pub struct Orchestrator {
    pub(crate) table: RequirementTable,
    pub(crate) resolver: EnvironmentResolver,
    pub(crate) installer: PackageInstaller,
    pub(crate) probe: Arc<dyn EnvironmentProbe>,
    pub(crate) log: InstallLog,
    pub(crate) state: InstallState,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("capabilities", &self.table.len())
            .field("log", &self.log.path())
            .field("installed", &self.state.snapshot())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator with an empty installed set.
    ///
    /// Call [`Orchestrator::reconcile`] once before relying on
    /// [`Orchestrator::installed`].
    #[must_use]
    pub fn new(
        table: RequirementTable,
        resolver: EnvironmentResolver,
        installer: PackageInstaller,
        probe: Arc<dyn EnvironmentProbe>,
        log: InstallLog,
    ) -> Self {
        Self {
            table,
            resolver,
            installer,
            probe,
            log,
            state: InstallState::new(),
        }
    }

    /// Requirement table this orchestrator serves.
    #[must_use]
    pub fn table(&self) -> &RequirementTable {
        &self.table
    }

    /// Environment resolver.
    #[must_use]
    pub fn resolver(&self) -> &EnvironmentResolver {
        &self.resolver
    }

    /// Install log.
    #[must_use]
    pub fn log(&self) -> &InstallLog {
        &self.log
    }

    /// Sorted copy of the installed set.
    #[must_use]
    pub fn installed(&self) -> BTreeSet<CapabilityName> {
        self.state.snapshot()
    }

    fn requirement(&self, name: &CapabilityName) -> PackageResult<&Requirement> {
        self.table
            .get(name)
            .ok_or_else(|| PackageError::UnknownCapability(name.clone()))
    }

    fn missing_for(&self, requirement: &Requirement) -> Vec<PackageSpec> {
        requirement
            .packages
            .iter()
            .filter(|spec| !self.probe.is_satisfied(spec))
            .cloned()
            .collect()
    }

    /// Required packages of `name` that are not present, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownCapability`] for an unknown name.
    pub fn missing_packages(&self, name: &CapabilityName) -> PackageResult<Vec<PackageSpec>> {
        Ok(self.missing_for(self.requirement(name)?))
    }

    /// Whether every required package of `name` is present.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownCapability`] for an unknown name.
    pub fn is_installed(&self, name: &CapabilityName) -> PackageResult<bool> {
        Ok(self.missing_packages(name)?.is_empty())
    }

    /// Install whatever `name` is missing.
    ///
    /// When nothing is missing no command runs and nothing is logged; the
    /// capability is only marked installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is unknown, no interpreter is
    /// available, the package manager fails, or the log cannot be written.
    /// Nothing is logged for a failed install.
    pub fn ensure_installed(&self, name: &CapabilityName) -> PackageResult<InstallOutcome> {
        let requirement = self.requirement(name)?;
        let missing = self.missing_for(requirement);
        if missing.is_empty() {
            debug!(capability = %name, "all packages present");
            self.state.insert(name.clone());
            return Ok(InstallOutcome::AlreadySatisfied);
        }

        let python = self.resolver.target_interpreter()?;
        info!(
            capability = %name,
            missing = missing.len(),
            python = %python.display(),
            no_deps = requirement.no_deps,
            "installing capability"
        );
        self.installer.install(
            &python,
            &missing,
            &InstallOptions::no_deps(requirement.no_deps),
        )?;

        self.log.append(&InstallLogEntry::now(
            InstallAction::Install,
            name.clone(),
            missing.iter().map(|s| s.raw().to_string()).collect(),
        ))?;
        self.state.insert(name.clone());
        info!(capability = %name, "capability installed");
        Ok(InstallOutcome::Installed(missing))
    }

    /// Uninstall the packages of `name` that no other installed capability needs.
    ///
    /// Retained packages are recorded with a `skip_uninstall` entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability is unknown, the package manager
    /// fails, or the log cannot be written.
    pub fn uninstall(&self, name: &CapabilityName) -> PackageResult<UninstallOutcome> {
        let requirement = self.requirement(name)?;
        if requirement.packages.is_empty() {
            debug!(capability = %name, "no packages declared, nothing to uninstall");
            return Ok(UninstallOutcome::default());
        }

        let installed = self.state.snapshot();
        let plan = plan_removal(
            &requirement.packages,
            self.table.declared_by(installed.iter(), name),
        );

        if !plan.remove.is_empty() {
            let python = self.resolver.target_interpreter()?;
            self.installer.uninstall(&python, &plan.removal_names())?;
            self.log.append(&InstallLogEntry::now(
                InstallAction::Uninstall,
                name.clone(),
                plan.remove.iter().map(|s| s.raw().to_string()).collect(),
            ))?;
            self.state.remove(name);
            info!(capability = %name, removed = plan.remove.len(), "capability uninstalled");
        }

        if !plan.retain.is_empty() {
            self.log.append(&InstallLogEntry::now(
                InstallAction::SkipUninstall,
                name.clone(),
                plan.retain.iter().map(|s| s.raw().to_string()).collect(),
            ))?;
            info!(
                capability = %name,
                retained = plan.retain.len(),
                "kept packages required by other capabilities"
            );
        }

        Ok(UninstallOutcome {
            removed: plan.remove,
            retained: plan.retain,
        })
    }

    /// Rebuild the installed set from the log and live probes.
    ///
    /// Replays the log (install adds, uninstall removes), drops names whose
    /// packages have since gone missing, and adds capabilities whose
    /// packages are already present. Log entries for names outside the
    /// requirement table are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn reconcile(&self) -> PackageResult<BTreeSet<CapabilityName>> {
        let mut replayed = BTreeSet::new();
        for entry in self.log.entries()? {
            match entry.action {
                InstallAction::Install => {
                    replayed.insert(entry.capability);
                },
                InstallAction::Uninstall => {
                    replayed.remove(&entry.capability);
                },
                InstallAction::SkipUninstall => {},
            }
        }

        let mut installed = BTreeSet::new();
        for requirement in self.table.iter() {
            let name = &requirement.capability;
            let satisfied = self.missing_for(requirement).is_empty();
            match (replayed.contains(name), satisfied) {
                (true, true) => {
                    installed.insert(name.clone());
                },
                (true, false) => {
                    warn!(capability = %name, "logged as installed but packages are missing");
                },
                (false, true) => {
                    debug!(capability = %name, "found already satisfied");
                    installed.insert(name.clone());
                },
                (false, false) => {},
            }
        }

        for name in replayed.iter().filter(|n| self.table.get(n).is_none()) {
            debug!(capability = %name, "ignoring log entries for unknown capability");
        }

        info!(installed = installed.len(), "reconciled install state");
        self.state.replace(installed.clone());
        Ok(installed)
    }

    /// Make an existing dedicated environment importable at startup.
    ///
    /// The environment itself is created by the first install.
    pub fn activate_environment(&self) {
        if let Some(site) = self.resolver.activate() {
            debug!(path = %site.display(), "environment activated");
        }
    }
}
