//! Presence probes for installed packages.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::environment::{EnvironmentResolver, ImportPaths};
use crate::spec::{DistributionName, PackageSpec};

/// Answers "is this package available to the target interpreter?".
pub trait EnvironmentProbe: Send + Sync {
    /// Whether distribution metadata for `name` is installed.
    fn has_distribution(&self, name: &DistributionName) -> bool;

    /// Whether the top-level module `module` can be imported.
    fn has_module(&self, module: &str) -> bool;

    /// Installed version of `name`, if known.
    fn distribution_version(&self, _name: &DistributionName) -> Option<String> {
        None
    }

    /// Metadata probe first, import probe as fallback.
    fn is_satisfied(&self, spec: &PackageSpec) -> bool {
        self.has_distribution(spec.name()) || self.has_module(&spec.import_name())
    }
}

const DISTRIBUTION_SCRIPT: &str = "\
import sys
from importlib import metadata
try:
    print(metadata.version(sys.argv[1]))
except metadata.PackageNotFoundError:
    sys.exit(1)
";

const MODULE_SCRIPT: &str = "\
import sys
from importlib import util
sys.exit(0 if util.find_spec(sys.argv[1]) is not None else 1)
";

/// Where the probing interpreter comes from.
#[derive(Debug)]
enum Interpreter {
    Fixed(PathBuf),
    /// Re-resolved per query, so a dedicated environment created after
    /// startup is picked up.
    Runtime(EnvironmentResolver),
}

/// Probe that asks an interpreter via short scripts.
///
/// Runs with `PYTHONPATH` set from the shared [`ImportPaths`], so packages in
/// the dedicated environment are visible even when probing the host
/// interpreter.
pub struct InterpreterProbe {
    runner: Arc<dyn CommandRunner>,
    python: Interpreter,
    paths: ImportPaths,
}

impl std::fmt::Debug for InterpreterProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterProbe")
            .field("python", &self.python)
            .finish_non_exhaustive()
    }
}

impl InterpreterProbe {
    /// Probe through `python`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, python: impl Into<PathBuf>, paths: ImportPaths) -> Self {
        Self {
            runner,
            python: Interpreter::Fixed(python.into()),
            paths,
        }
    }

    /// Probe through whatever [`EnvironmentResolver::runtime_interpreter`]
    /// returns at the time of each query.
    #[must_use]
    pub fn following(runner: Arc<dyn CommandRunner>, resolver: EnvironmentResolver) -> Self {
        Self {
            runner,
            paths: resolver.import_paths().clone(),
            python: Interpreter::Runtime(resolver),
        }
    }

    fn interpreter(&self) -> Option<PathBuf> {
        match &self.python {
            Interpreter::Fixed(python) => Some(python.clone()),
            Interpreter::Runtime(resolver) => match resolver.runtime_interpreter() {
                Ok(python) => Some(python),
                Err(e) => {
                    warn!(error = %e, "no interpreter to probe with");
                    None
                },
            },
        }
    }

    fn query(&self, script: &str, arg: &str) -> Option<String> {
        let python = self.interpreter()?;
        let command = self
            .paths
            .apply(CommandSpec::new(&python).args(["-c", script, arg]));
        match self.runner.run(&command) {
            Ok(out) if out.success() => Some(out.stdout.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(python = %python.display(), error = %e, "probe failed to run");
                None
            },
        }
    }
}

impl EnvironmentProbe for InterpreterProbe {
    fn has_distribution(&self, name: &DistributionName) -> bool {
        let found = self.query(DISTRIBUTION_SCRIPT, name.as_str()).is_some();
        trace!(distribution = %name, found, "metadata probe");
        found
    }

    fn has_module(&self, module: &str) -> bool {
        let found = self.query(MODULE_SCRIPT, module).is_some();
        trace!(module, found, "import probe");
        found
    }

    fn distribution_version(&self, name: &DistributionName) -> Option<String> {
        self.query(DISTRIBUTION_SCRIPT, name.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct SetProbe {
        dists: HashSet<&'static str>,
        modules: HashSet<&'static str>,
    }

    impl EnvironmentProbe for SetProbe {
        fn has_distribution(&self, name: &DistributionName) -> bool {
            self.dists.contains(name.as_str())
        }

        fn has_module(&self, module: &str) -> bool {
            self.modules.contains(module)
        }
    }

    #[test]
    fn test_import_probe_is_fallback() {
        let probe = SetProbe {
            dists: HashSet::from(["gtts"]),
            modules: HashSet::from(["extension_bark"]),
        };
        // Case-insensitive through normalization.
        assert!(probe.is_satisfied(&PackageSpec::parse("gTTS")));
        // Git requirement resolved through the module name.
        assert!(probe.is_satisfied(&PackageSpec::parse(
            "extension_bark @ git+https://github.com/x/extension_bark@main"
        )));
        assert!(!probe.is_satisfied(&PackageSpec::parse("soundfile")));
    }

    #[cfg(unix)]
    #[test]
    fn test_interpreter_probe_reads_exit_status() {
        use crate::command::CommandOutput;
        use crate::error::PackageResult;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Scripted(Mutex<Vec<CommandSpec>>);
        impl CommandRunner for Scripted {
            fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
                self.0.lock().unwrap().push(command.clone());
                let target = command.get_args().last().cloned().unwrap_or_default();
                Ok(if target == "torch" {
                    CommandOutput::ok("2.3.0+cu121\n")
                } else {
                    CommandOutput::failed(1, "")
                })
            }
            fn locate(&self, _program: &str) -> Option<PathBuf> {
                None
            }
        }

        let runner = Arc::new(Scripted::default());
        let paths = ImportPaths::new();
        paths.push("/venv/lib/python3.11/site-packages");
        let probe = InterpreterProbe::new(runner.clone(), "/usr/bin/python3", paths);

        let torch = DistributionName::normalize("torch");
        assert!(probe.has_distribution(&torch));
        assert_eq!(probe.distribution_version(&torch).as_deref(), Some("2.3.0+cu121"));
        assert!(!probe.has_module("numpy"));

        let calls = runner.0.lock().unwrap();
        assert!(calls.iter().all(|c| c.get_env("PYTHONPATH").is_some()));
    }

    #[cfg(unix)]
    #[test]
    fn test_following_probe_switches_to_dedicated_interpreter() {
        use crate::command::CommandOutput;
        use crate::environment::EnvironmentMarkers;
        use crate::error::PackageResult;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Programs(Mutex<Vec<PathBuf>>);
        impl CommandRunner for Programs {
            fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
                self.0.lock().unwrap().push(command.program().to_path_buf());
                let args = command.get_args();
                if args.len() == 3 && args[1] == "venv" {
                    let dir = PathBuf::from(&args[2]);
                    std::fs::create_dir_all(dir.join("bin")).unwrap();
                    std::fs::write(dir.join("bin").join("python"), "").unwrap();
                    return Ok(CommandOutput::ok(""));
                }
                Ok(CommandOutput::failed(1, ""))
            }
            fn locate(&self, program: &str) -> Option<PathBuf> {
                (program == "python3").then(|| PathBuf::from("/usr/bin/python3"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Programs::default());
        let resolver =
            EnvironmentResolver::new(runner.clone(), EnvironmentMarkers::none(), dir.path().join("venv"));
        let probe = InterpreterProbe::following(runner.clone(), resolver.clone());

        assert!(!probe.has_module("numpy"));
        assert_eq!(
            runner.0.lock().unwrap().last(),
            Some(&PathBuf::from("/usr/bin/python3"))
        );

        let dedicated = resolver.ensure_dedicated_environment().unwrap();
        assert!(!probe.has_module("numpy"));
        assert_eq!(runner.0.lock().unwrap().last(), Some(&dedicated));
    }
}
