//! Startup wiring: home directory, catalog, environment and reconciliation.

use std::sync::Arc;

use anyhow::{Context, Result};
use hybrid_capabilities::{CapabilityRegistry, CapabilityService};
use hybrid_config::{Catalog, Preferences};
use hybrid_core::{CapabilityName, HybridHome};
use hybrid_packages::{
    CommandRunner, EnvironmentMarkers, EnvironmentResolver, InstallLog, InterpreterProbe,
    Orchestrator, PackageInstaller, SystemRunner,
};
use tracing::{debug, warn};

use crate::theme::Theme;

/// Everything a command needs.
pub(crate) struct App {
    pub(crate) home: HybridHome,
    pub(crate) prefs: Preferences,
    pub(crate) service: CapabilityService,
}

impl App {
    /// Build the service and reconcile the installed set from the log.
    pub(crate) fn open(home: HybridHome, prefs: Preferences) -> Result<Self> {
        home.ensure()
            .with_context(|| format!("failed to create {}", home.root().display()))?;

        let catalog = Catalog::load(
            &home.requirements_override_path(),
            &home.metadata_override_path(),
        )
        .context("failed to load capability catalog")?;
        for rejected in catalog.rejected() {
            eprintln!(
                "{}",
                Theme::warning(&format!(
                    "ignoring {} in {}: {}",
                    rejected.key, rejected.source, rejected.reason
                ))
            );
        }
        let registry = CapabilityRegistry::builtin(&catalog);

        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let resolver = EnvironmentResolver::new(
            Arc::clone(&runner),
            EnvironmentMarkers::from_process(),
            home.venv_dir(),
        );

        let probe = Arc::new(InterpreterProbe::following(
            Arc::clone(&runner),
            resolver.clone(),
        ));
        let orchestrator = Orchestrator::new(
            registry.requirement_table(),
            resolver,
            PackageInstaller::new(Arc::clone(&runner)),
            probe,
            InstallLog::new(home.install_log_path()),
        );
        orchestrator.activate_environment();
        match orchestrator.resolver().runtime_interpreter() {
            Ok(python) => debug!(python = %python.display(), "probing through interpreter"),
            Err(e) => warn!(error = %e, "no Python interpreter available"),
        }
        orchestrator
            .reconcile()
            .context("failed to reconcile install state")?;

        let service = CapabilityService::new(Arc::new(registry), Arc::new(orchestrator), runner);
        Ok(Self {
            home,
            prefs,
            service,
        })
    }
}

/// Parse a capability name from the command line.
pub(crate) fn parse_name(raw: &str) -> Result<CapabilityName> {
    CapabilityName::new(raw).with_context(|| format!("invalid capability name '{raw}'"))
}
