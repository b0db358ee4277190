//! Test fixtures: demo manifests and a ready-made orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hybrid_core::CapabilityName;
use hybrid_packages::{
    EnvironmentMarkers, EnvironmentResolver, InstallLog, Orchestrator, PackageInstaller,
    Requirement, RequirementTable,
};
use tempfile::TempDir;

use crate::mocks::{FakePip, MockProbe};

/// Two capabilities sharing `bar==2.0`.
pub const DEMO_MANIFEST: &str = r#"{"demo": ["foo==1.0", "bar==2.0"], "demo2": ["bar==2.0"]}"#;

/// Create a capability name, panicking if it is invalid.
#[must_use]
pub fn test_name(name: &str) -> CapabilityName {
    CapabilityName::new(name).unwrap_or_else(|e| panic!("invalid test name {name:?}: {e}"))
}

/// Requirement table equivalent to [`DEMO_MANIFEST`].
#[must_use]
pub fn demo_table() -> RequirementTable {
    RequirementTable::new()
        .with(Requirement::new(test_name("demo"), &["foo==1.0", "bar==2.0"], false))
        .with(Requirement::new(test_name("demo2"), &["bar==2.0"], false))
}

/// One capability per specifier form: plain, pinned and VCS.
#[must_use]
pub fn specifier_forms_table() -> RequirementTable {
    RequirementTable::new()
        .with(Requirement::new(test_name("plain"), &["name"], false))
        .with(Requirement::new(test_name("pinned"), &["name==1.2.3"], false))
        .with(Requirement::new(
            test_name("vcs"),
            &["name @ git+https://host/repo"],
            true,
        ))
}

/// An orchestrator over a fake environment in a temporary home.
///
/// The dedicated environment and the install log live under `dir`. No
/// isolated environment is active, so installs go to the dedicated one.
pub struct TestEnv {
    /// Temporary home; removed on drop.
    pub dir: TempDir,
    /// Installed packages.
    pub probe: MockProbe,
    /// Runner simulating pip, venv and nvcc.
    pub runner: Arc<FakePip>,
    /// Orchestrator under test (not yet reconciled).
    pub orchestrator: Arc<Orchestrator>,
}

impl TestEnv {
    /// Fresh environment with nothing installed.
    #[must_use]
    pub fn new(table: RequirementTable) -> Self {
        let probe = MockProbe::new();
        let runner = FakePip::new(probe.clone());
        Self::with_runner(table, probe, runner)
    }

    /// Environment using a preconfigured probe and runner.
    #[must_use]
    pub fn with_runner(table: RequirementTable, probe: MockProbe, runner: FakePip) -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let runner = Arc::new(runner);
        let orchestrator = Arc::new(build_orchestrator(dir.path(), table, &probe, &runner));
        Self {
            dir,
            probe,
            runner,
            orchestrator,
        }
    }

    /// A second orchestrator over the same home and environment, as a
    /// restarted process would see it.
    #[must_use]
    pub fn reopen(&self, table: RequirementTable) -> Arc<Orchestrator> {
        Arc::new(build_orchestrator(
            self.dir.path(),
            table,
            &self.probe,
            &self.runner,
        ))
    }

    /// Path of the install log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("logs").join("install.log")
    }

    /// Dedicated environment directory.
    #[must_use]
    pub fn venv_dir(&self) -> PathBuf {
        self.dir.path().join("venv")
    }

    /// Raw install log lines.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn build_orchestrator(
    home: &Path,
    table: RequirementTable,
    probe: &MockProbe,
    runner: &Arc<FakePip>,
) -> Orchestrator {
    let resolver = EnvironmentResolver::new(
        runner.clone(),
        EnvironmentMarkers::none(),
        home.join("venv"),
    );
    Orchestrator::new(
        table,
        resolver,
        PackageInstaller::new(runner.clone()),
        Arc::new(probe.clone()),
        InstallLog::new(home.join("logs").join("install.log")),
    )
}
