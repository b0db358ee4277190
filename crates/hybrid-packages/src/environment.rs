//! Isolated-environment detection and the dedicated environment.
//!
//! If the process was started inside a virtualenv or conda environment,
//! packages go there. Otherwise a private environment under the Hybrid home
//! is created on first use, and its `site-packages` is published through
//! [`ImportPaths`] so probes and capability invocations can import from it
//! without a restart.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{PackageError, PackageResult};

/// Interpreter names tried on `PATH`, in order.
const HOST_INTERPRETERS: &[&str] = &["python3", "python"];

/// Process-level markers that identify an active isolated environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMarkers {
    virtual_env: Option<PathBuf>,
    conda_prefix: Option<PathBuf>,
}

impl EnvironmentMarkers {
    /// Read `VIRTUAL_ENV` and `CONDA_PREFIX` from the current process.
    #[must_use]
    pub fn from_process() -> Self {
        let read = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            virtual_env: read("VIRTUAL_ENV"),
            conda_prefix: read("CONDA_PREFIX"),
        }
    }

    /// No active environment.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Markers for an active virtualenv at `prefix`.
    #[must_use]
    pub fn virtual_env(prefix: impl Into<PathBuf>) -> Self {
        Self {
            virtual_env: Some(prefix.into()),
            conda_prefix: None,
        }
    }

    /// Markers for an active conda environment at `prefix`.
    #[must_use]
    pub fn conda(prefix: impl Into<PathBuf>) -> Self {
        Self {
            virtual_env: None,
            conda_prefix: Some(prefix.into()),
        }
    }

    /// Whether any isolated environment is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_prefix().is_some()
    }

    /// Prefix of the active environment, virtualenv first.
    #[must_use]
    pub fn active_prefix(&self) -> Option<&Path> {
        self.virtual_env
            .as_deref()
            .or(self.conda_prefix.as_deref())
    }
}

/// Shared list of extra import directories.
///
/// Cloning shares the list; all clones see every addition.
#[derive(Debug, Clone, Default)]
pub struct ImportPaths {
    inner: Arc<RwLock<Vec<PathBuf>>>,
}

impl ImportPaths {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path` unless already present. Returns `true` if it was added.
    pub fn push(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains(&path) {
            return false;
        }
        guard.push(path);
        true
    }

    /// Copy of the current list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The list joined with the platform separator, or `None` if empty.
    #[must_use]
    pub fn to_pythonpath(&self) -> Option<OsString> {
        let paths = self.snapshot();
        if paths.is_empty() {
            return None;
        }
        std::env::join_paths(paths).ok()
    }

    /// Add `PYTHONPATH` to `command` if the list is non-empty.
    #[must_use]
    pub fn apply(&self, command: CommandSpec) -> CommandSpec {
        match self.to_pythonpath() {
            Some(value) => command.env("PYTHONPATH", value),
            None => command,
        }
    }
}

/// Decides which interpreter receives installs.
///
/// Clones share the import path list and the creation lock.
#[derive(Clone)]
pub struct EnvironmentResolver {
    runner: Arc<dyn CommandRunner>,
    markers: EnvironmentMarkers,
    venv_dir: PathBuf,
    paths: ImportPaths,
    create_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for EnvironmentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentResolver")
            .field("markers", &self.markers)
            .field("venv_dir", &self.venv_dir)
            .finish_non_exhaustive()
    }
}

impl EnvironmentResolver {
    /// Create a resolver with a dedicated environment at `venv_dir`.
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        markers: EnvironmentMarkers,
        venv_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            markers,
            venv_dir: venv_dir.into(),
            paths: ImportPaths::new(),
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Share an existing import path list instead of a fresh one.
    #[must_use]
    pub fn with_import_paths(mut self, paths: ImportPaths) -> Self {
        self.paths = paths;
        self
    }

    /// The import path list this resolver publishes into.
    #[must_use]
    pub fn import_paths(&self) -> &ImportPaths {
        &self.paths
    }

    /// Directory of the dedicated environment.
    #[must_use]
    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    /// Whether the process already runs inside an isolated environment.
    #[must_use]
    pub fn is_isolated_environment_active(&self) -> bool {
        self.markers.is_active()
    }

    /// Interpreter of the active environment, or the first one on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Environment`] if no interpreter can be found.
    pub fn host_interpreter(&self) -> PackageResult<PathBuf> {
        if let Some(prefix) = self.markers.active_prefix() {
            let candidate = interpreter_in(prefix);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        HOST_INTERPRETERS
            .iter()
            .find_map(|name| self.runner.locate(name))
            .ok_or_else(|| {
                PackageError::Environment("no python interpreter found on PATH".to_string())
            })
    }

    /// Interpreter path inside the dedicated environment (may not exist yet).
    #[must_use]
    pub fn dedicated_interpreter(&self) -> PathBuf {
        interpreter_in(&self.venv_dir)
    }

    /// Create the dedicated environment if needed and return its interpreter.
    ///
    /// Idempotent: once the interpreter exists nothing is run. Concurrent
    /// callers wait for a single creation.
    ///
    /// # Errors
    ///
    /// Returns an error if no host interpreter exists or `venv` fails.
    pub fn ensure_dedicated_environment(&self) -> PackageResult<PathBuf> {
        let python = self.dedicated_interpreter();
        let _creating = self
            .create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if python.exists() {
            return Ok(python);
        }

        let host = self.host_interpreter()?;
        info!(path = %self.venv_dir.display(), "creating dedicated environment");
        let command = CommandSpec::new(host)
            .args(["-m", "venv"])
            .arg(self.venv_dir.display().to_string());
        let output = self.runner.run(&command)?;
        if !output.success() {
            return Err(PackageError::Environment(format!(
                "{command} exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        if !python.exists() {
            return Err(PackageError::Environment(format!(
                "environment created but {} is missing",
                python.display()
            )));
        }
        Ok(python)
    }

    /// `site-packages` of the dedicated environment, if it exists.
    #[must_use]
    pub fn site_packages(&self) -> Option<PathBuf> {
        let windows = self.venv_dir.join("Lib").join("site-packages");
        if windows.is_dir() {
            return Some(windows);
        }
        let lib = self.venv_dir.join("lib");
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&lib)
            .ok()?
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
            .map(|e| e.path().join("site-packages"))
            .filter(|p| p.is_dir())
            .collect();
        candidates.sort();
        candidates.pop()
    }

    /// Interpreter that installs should target.
    ///
    /// Inside an active environment that is the current interpreter.
    /// Otherwise the dedicated environment is ensured and published to the
    /// import path list.
    ///
    /// # Errors
    ///
    /// Returns an error if no interpreter is available.
    pub fn target_interpreter(&self) -> PackageResult<PathBuf> {
        if self.is_isolated_environment_active() {
            return self.host_interpreter();
        }
        let python = self.ensure_dedicated_environment()?;
        self.inject_site_packages();
        Ok(python)
    }

    /// Interpreter used for probing and invocation, without side effects.
    ///
    /// Prefers the dedicated environment once it exists, so packages
    /// installed there are found even by a fresh process.
    ///
    /// # Errors
    ///
    /// Returns an error if no interpreter is available.
    pub fn runtime_interpreter(&self) -> PackageResult<PathBuf> {
        if !self.is_isolated_environment_active() {
            let dedicated = self.dedicated_interpreter();
            if dedicated.exists() {
                return Ok(dedicated);
            }
        }
        self.host_interpreter()
    }

    /// Startup activation: make an existing dedicated environment importable.
    ///
    /// Never creates the environment; that waits for the first install.
    /// No-op inside an active environment. Returns the injected directory.
    pub fn activate(&self) -> Option<PathBuf> {
        if self.is_isolated_environment_active() {
            debug!("isolated environment active, skipping activation");
            return None;
        }
        if !self.dedicated_interpreter().exists() {
            debug!(path = %self.venv_dir.display(), "dedicated environment not created yet");
            return None;
        }
        self.inject_site_packages()
    }

    fn inject_site_packages(&self) -> Option<PathBuf> {
        let site = self.site_packages()?;
        if self.paths.push(site.clone()) {
            debug!(path = %site.display(), "added dedicated site-packages to import path");
        }
        Some(site)
    }
}

/// Interpreter path inside an environment prefix.
fn interpreter_in(prefix: &Path) -> PathBuf {
    if cfg!(windows) {
        prefix.join("Scripts").join("python.exe")
    } else {
        prefix.join("bin").join("python")
    }
}
