//! Package manager invocation.
//!
//! Prefers `uv` when it is on `PATH` and falls back to `python -m pip`.
//! Before each install the interpreter's own pip is bootstrapped with
//! `ensurepip`; a failure there is only logged, since the install that
//! follows reports the real problem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{PackageError, PackageResult};
use crate::spec::{DistributionName, PackageSpec};

/// Which package manager front end to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerKind {
    /// `uv pip ...` at the given path.
    Uv(PathBuf),
    /// `<python> -m pip ...`.
    Pip,
}

/// Flags applied to one install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Do not resolve or upgrade transitive dependencies.
    pub no_deps: bool,
    /// Alternate package index.
    pub index_url: Option<String>,
    /// Allow pre-release versions.
    pub pre: bool,
}

impl InstallOptions {
    /// Options with dependency resolution disabled when `no_deps` is set.
    #[must_use]
    pub fn no_deps(no_deps: bool) -> Self {
        Self {
            no_deps,
            ..Self::default()
        }
    }
}

/// Builds and runs install and uninstall commands.
#[derive(Clone)]
pub struct PackageInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageInstaller").finish_non_exhaustive()
    }
}

impl PackageInstaller {
    /// Create an installer running commands through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Pick `uv` if it is on `PATH`, else pip.
    #[must_use]
    pub fn choose(&self) -> InstallerKind {
        match self.runner.locate("uv") {
            Some(path) => InstallerKind::Uv(path),
            None => InstallerKind::Pip,
        }
    }

    /// Make sure `python` has a working pip. Never fails.
    pub fn bootstrap(&self, python: &Path) {
        let command = CommandSpec::new(python).args(["-m", "ensurepip", "--upgrade"]);
        match self.runner.run(&command) {
            Ok(out) if out.success() => debug!(python = %python.display(), "pip bootstrapped"),
            Ok(out) => warn!(
                python = %python.display(),
                code = ?out.code,
                stderr = %out.stderr.trim(),
                "ensurepip failed, continuing"
            ),
            Err(e) => warn!(python = %python.display(), error = %e, "ensurepip failed, continuing"),
        }
    }

    /// Install command for `packages` into `python`.
    #[must_use]
    pub fn install_command(
        kind: &InstallerKind,
        python: &Path,
        packages: &[PackageSpec],
        options: &InstallOptions,
    ) -> CommandSpec {
        let mut command = match kind {
            InstallerKind::Uv(uv) => CommandSpec::new(uv)
                .args(["pip", "install", "-p"])
                .arg(python.display().to_string()),
            InstallerKind::Pip => CommandSpec::new(python).args(["-m", "pip", "install"]),
        };
        if options.no_deps {
            command = command.arg("--no-deps");
        }
        if let Some(url) = &options.index_url {
            command = command.args(["--index-url", url.as_str()]);
        }
        if options.pre {
            command = command.arg("--pre");
        }
        command.args(packages.iter().map(PackageSpec::raw))
    }

    /// Uninstall command for distributions `names` from `python`.
    #[must_use]
    pub fn uninstall_command(
        kind: &InstallerKind,
        python: &Path,
        names: &[DistributionName],
    ) -> CommandSpec {
        let command = match kind {
            InstallerKind::Uv(uv) => CommandSpec::new(uv)
                .args(["pip", "uninstall", "-p"])
                .arg(python.display().to_string()),
            InstallerKind::Pip => CommandSpec::new(python).args(["-m", "pip", "uninstall", "-y"]),
        };
        command.args(names.iter().map(DistributionName::as_str))
    }

    /// Bootstrap pip, then install `packages` into `python`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InstallFailed`] on a non-zero exit, or
    /// [`PackageError::Spawn`] if the package manager cannot be started.
    pub fn install(
        &self,
        python: &Path,
        packages: &[PackageSpec],
        options: &InstallOptions,
    ) -> PackageResult<()> {
        self.bootstrap(python);
        let command = Self::install_command(&self.choose(), python, packages, options);
        info!(command = %command, "installing packages");
        let out = self.runner.run(&command)?;
        if !out.success() {
            return Err(PackageError::InstallFailed {
                command: command.to_string(),
                code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(())
    }

    /// Uninstall distributions `names` from `python`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UninstallFailed`] on a non-zero exit.
    pub fn uninstall(&self, python: &Path, names: &[DistributionName]) -> PackageResult<()> {
        let command = Self::uninstall_command(&self.choose(), python, names);
        info!(command = %command, "uninstalling packages");
        let out = self.runner.run(&command)?;
        if !out.success() {
            return Err(PackageError::UninstallFailed {
                command: command.to_string(),
                code: out.code,
                stderr: out.stderr,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::command::CommandOutput;

    struct Runner {
        uv: bool,
        fail_ensurepip: bool,
        install_code: i32,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl Runner {
        fn new(uv: bool) -> Self {
            Self {
                uv,
                fail_ensurepip: false,
                install_code: 0,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Runner {
        fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
            self.calls.lock().unwrap().push(command.clone());
            if command.get_args().iter().any(|a| a == "ensurepip") {
                return Ok(if self.fail_ensurepip {
                    CommandOutput::failed(1, "No module named ensurepip")
                } else {
                    CommandOutput::ok("")
                });
            }
            Ok(CommandOutput {
                code: Some(self.install_code),
                stdout: String::new(),
                stderr: "resolution failed".to_string(),
            })
        }

        fn locate(&self, program: &str) -> Option<PathBuf> {
            (self.uv && program == "uv").then(|| PathBuf::from("/usr/bin/uv"))
        }
    }

    fn specs(raw: &[&str]) -> Vec<PackageSpec> {
        raw.iter().map(|s| PackageSpec::parse(s)).collect()
    }

    #[test]
    fn test_uv_command_shape() {
        let cmd = PackageInstaller::install_command(
            &InstallerKind::Uv(PathBuf::from("uv")),
            Path::new("/venv/bin/python"),
            &specs(&["kokoro==0.9", "soundfile"]),
            &InstallOptions::no_deps(true),
        );
        assert_eq!(
            cmd.to_string(),
            "uv pip install -p /venv/bin/python --no-deps kokoro==0.9 soundfile"
        );
    }

    #[test]
    fn test_pip_command_shape() {
        let python = Path::new("/venv/bin/python");
        let install = PackageInstaller::install_command(
            &InstallerKind::Pip,
            python,
            &specs(&["gTTS"]),
            &InstallOptions::default(),
        );
        assert_eq!(install.get_args(), ["-m", "pip", "install", "gTTS"]);

        let uninstall = PackageInstaller::uninstall_command(
            &InstallerKind::Pip,
            python,
            &[DistributionName::normalize("gTTS")],
        );
        assert_eq!(uninstall.get_args(), ["-m", "pip", "uninstall", "-y", "gtts"]);
    }

    #[test]
    fn test_index_and_pre_flags() {
        let options = InstallOptions {
            no_deps: false,
            index_url: Some("https://download.pytorch.org/whl/nightly/cu128".to_string()),
            pre: true,
        };
        let cmd = PackageInstaller::install_command(
            &InstallerKind::Pip,
            Path::new("python"),
            &specs(&["torch"]),
            &options,
        );
        assert_eq!(
            cmd.get_args(),
            [
                "-m",
                "pip",
                "install",
                "--index-url",
                "https://download.pytorch.org/whl/nightly/cu128",
                "--pre",
                "torch"
            ]
        );
    }

    #[test]
    fn test_prefers_uv_when_present() {
        let with_uv = PackageInstaller::new(Arc::new(Runner::new(true)));
        assert_eq!(with_uv.choose(), InstallerKind::Uv(PathBuf::from("/usr/bin/uv")));
        let without = PackageInstaller::new(Arc::new(Runner::new(false)));
        assert_eq!(without.choose(), InstallerKind::Pip);
    }

    #[test]
    fn test_bootstrap_failure_is_not_fatal() {
        let mut runner = Runner::new(false);
        runner.fail_ensurepip = true;
        let runner = Arc::new(runner);
        let installer = PackageInstaller::new(runner.clone());

        installer
            .install(Path::new("python"), &specs(&["gTTS"]), &InstallOptions::default())
            .unwrap();
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].get_args().contains(&"ensurepip".to_string()));
    }

    #[test]
    fn test_non_zero_exit_is_an_error() {
        let mut runner = Runner::new(false);
        runner.install_code = 2;
        let installer = PackageInstaller::new(Arc::new(runner));

        let err = installer
            .install(Path::new("python"), &specs(&["nope"]), &InstallOptions::default())
            .unwrap_err();
        match err {
            PackageError::InstallFailed { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "resolution failed");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
