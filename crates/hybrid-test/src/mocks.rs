//! Mock implementations for testing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use hybrid_capabilities::{
    Capability, CapabilityError, CapabilityOutput, CapabilityResult, Invocation,
    InvocationContext,
};
use hybrid_core::CapabilityName;
use hybrid_packages::{
    CommandOutput, CommandRunner, CommandSpec, DistributionName, EnvironmentProbe, PackageResult,
    PackageSpec, SpecSource,
};

/// In-memory view of an interpreter's installed packages.
///
/// Clones share state, so a [`FakePip`] holding a clone can install into the
/// probe the orchestrator reads from.
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    /// Installed distributions by normalized name, with versions.
    distributions: Arc<Mutex<HashMap<String, String>>>,
    /// Importable modules that have no distribution metadata.
    modules: Arc<Mutex<HashSet<String>>>,
}

impl MockProbe {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `name` installed at `version`.
    #[must_use]
    pub fn with_distribution(self, name: &str, version: &str) -> Self {
        self.install(name, version);
        self
    }

    /// Start with a bare importable module.
    #[must_use]
    pub fn with_module(self, module: &str) -> Self {
        if let Ok(mut guard) = self.modules.lock() {
            guard.insert(module.to_string());
        }
        self
    }

    /// Install or replace a distribution.
    pub fn install(&self, name: &str, version: &str) {
        if let Ok(mut guard) = self.distributions.lock() {
            guard.insert(
                DistributionName::normalize(name).as_str().to_string(),
                version.to_string(),
            );
        }
    }

    /// Remove a distribution, as another process might. Returns whether it
    /// was present.
    pub fn remove(&self, name: &str) -> bool {
        self.distributions
            .lock()
            .map(|mut guard| {
                guard
                    .remove(DistributionName::normalize(name).as_str())
                    .is_some()
            })
            .unwrap_or(false)
    }

    /// Whether a distribution is installed.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.distributions
            .lock()
            .map(|guard| guard.contains_key(DistributionName::normalize(name).as_str()))
            .unwrap_or(false)
    }

    /// Sorted names of installed distributions.
    #[must_use]
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .distributions
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl EnvironmentProbe for MockProbe {
    fn has_distribution(&self, name: &DistributionName) -> bool {
        self.distributions
            .lock()
            .map(|guard| guard.contains_key(name.as_str()))
            .unwrap_or(false)
    }

    fn has_module(&self, module: &str) -> bool {
        self.modules
            .lock()
            .map(|guard| guard.contains(module))
            .unwrap_or(false)
    }

    fn distribution_version(&self, name: &DistributionName) -> Option<String> {
        self.distributions
            .lock()
            .ok()
            .and_then(|guard| guard.get(name.as_str()).cloned())
    }
}

/// Command runner that records every command and simulates its effect.
///
/// - `<python> -m venv <dir>` creates `<dir>/bin/python` and a
///   `lib/python3.11/site-packages` directory.
/// - `-m ensurepip` succeeds.
/// - `pip install` / `uv pip install` add the named distributions to the
///   [`MockProbe`] (version taken from an `==` pin, else `1.0.0`).
/// - `pip uninstall` / `uv pip uninstall` remove them.
/// - `nvcc --version` prints the configured output.
#[derive(Debug, Clone)]
pub struct FakePip {
    probe: MockProbe,
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    install_failure: Arc<Mutex<Option<CommandOutput>>>,
    on_path: Arc<Mutex<HashMap<String, PathBuf>>>,
    nvcc_output: Option<String>,
    venv_delay: Option<Duration>,
}

impl FakePip {
    /// Runner that installs into `probe`, with `python3` on `PATH`.
    #[must_use]
    pub fn new(probe: MockProbe) -> Self {
        let mut on_path = HashMap::new();
        on_path.insert("python3".to_string(), PathBuf::from("/usr/bin/python3"));
        Self {
            probe,
            calls: Arc::new(Mutex::new(Vec::new())),
            install_failure: Arc::new(Mutex::new(None)),
            on_path: Arc::new(Mutex::new(on_path)),
            nvcc_output: None,
            venv_delay: None,
        }
    }

    /// Put `uv` on `PATH`.
    #[must_use]
    pub fn with_uv(self) -> Self {
        self.put_on_path("uv", "/usr/local/bin/uv");
        self
    }

    /// Put `nvcc` on `PATH`, printing `output` for `--version`.
    #[must_use]
    pub fn with_nvcc(mut self, output: impl Into<String>) -> Self {
        self.put_on_path("nvcc", "/usr/local/cuda/bin/nvcc");
        self.nvcc_output = Some(output.into());
        self
    }

    /// Make `-m venv` take `delay` before the layout appears.
    #[must_use]
    pub fn with_venv_delay(mut self, delay: Duration) -> Self {
        self.venv_delay = Some(delay);
        self
    }

    /// Remove every program from `PATH`.
    #[must_use]
    pub fn with_empty_path(self) -> Self {
        if let Ok(mut guard) = self.on_path.lock() {
            guard.clear();
        }
        self
    }

    fn put_on_path(&self, program: &str, path: &str) {
        if let Ok(mut guard) = self.on_path.lock() {
            guard.insert(program.to_string(), PathBuf::from(path));
        }
    }

    /// Make every following install exit with `code`.
    pub fn fail_installs(&self, code: i32, stderr: &str) {
        if let Ok(mut guard) = self.install_failure.lock() {
            *guard = Some(CommandOutput::failed(code, stderr));
        }
    }

    /// Let installs succeed again.
    pub fn succeed_installs(&self) {
        if let Ok(mut guard) = self.install_failure.lock() {
            *guard = None;
        }
    }

    /// Every command run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Environment creations run so far.
    #[must_use]
    pub fn venv_calls(&self) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| is_venv(c.get_args()))
            .collect()
    }

    /// Package-manager install commands run so far.
    #[must_use]
    pub fn install_calls(&self) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(pip_action(c.get_args()), Some(("install", _))))
            .collect()
    }

    /// Package-manager uninstall commands run so far.
    #[must_use]
    pub fn uninstall_calls(&self) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(pip_action(c.get_args()), Some(("uninstall", _))))
            .collect()
    }

    /// The probe this runner installs into.
    #[must_use]
    pub fn probe(&self) -> &MockProbe {
        &self.probe
    }

    fn simulate_install(&self, operands: &[String]) -> CommandOutput {
        let failure = self
            .install_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(failure) = failure {
            return failure;
        }
        for raw in operands {
            let spec = PackageSpec::parse(raw);
            let version = match spec.source() {
                SpecSource::Index {
                    constraint: Some(c),
                } => c.strip_prefix("==").unwrap_or("1.0.0").to_string(),
                _ => "1.0.0".to_string(),
            };
            self.probe.install(spec.name().as_str(), &version);
        }
        CommandOutput::ok(format!("Successfully installed {}", operands.join(" ")))
    }

    fn simulate_uninstall(&self, operands: &[String]) -> CommandOutput {
        for name in operands {
            self.probe.remove(name);
        }
        CommandOutput::ok("")
    }
}

/// Split pip arguments into the subcommand and its operands.
fn pip_action(args: &[String]) -> Option<(&str, Vec<String>)> {
    let pip = args.iter().position(|a| a == "pip")?;
    let action = args.get(pip.checked_add(1)?)?.as_str();
    if action != "install" && action != "uninstall" {
        return None;
    }
    let mut operands = Vec::new();
    let mut rest = args.iter().skip(pip.checked_add(2)?);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-p" | "--index-url" => {
                rest.next();
            },
            flag if flag.starts_with('-') => {},
            operand => operands.push(operand.to_string()),
        }
    }
    Some((action, operands))
}

fn is_venv(args: &[String]) -> bool {
    args.len() >= 3 && args[0] == "-m" && args[1] == "venv"
}

/// Create the on-disk layout `python -m venv` would.
fn create_venv(dir: &Path) -> std::io::Result<()> {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin)?;
    std::fs::write(bin.join("python"), "")?;
    std::fs::create_dir_all(dir.join("lib").join("python3.11").join("site-packages"))?;
    Ok(())
}

impl CommandRunner for FakePip {
    fn run(&self, command: &CommandSpec) -> PackageResult<CommandOutput> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(command.clone());
        }
        let args = command.get_args();

        if command.program().ends_with("nvcc") {
            return Ok(match &self.nvcc_output {
                Some(out) => CommandOutput::ok(out.clone()),
                None => CommandOutput::failed(127, "nvcc: not found"),
            });
        }
        if args.iter().any(|a| a == "ensurepip") {
            return Ok(CommandOutput::ok(""));
        }
        if is_venv(args) {
            if let Some(delay) = self.venv_delay {
                thread::sleep(delay);
            }
            return Ok(match create_venv(Path::new(&args[2])) {
                Ok(()) => CommandOutput::ok(""),
                Err(e) => CommandOutput::failed(1, e.to_string()),
            });
        }
        match pip_action(args) {
            Some(("install", operands)) => Ok(self.simulate_install(&operands)),
            Some((_, operands)) => Ok(self.simulate_uninstall(&operands)),
            None => Ok(CommandOutput::failed(1, "unsupported command")),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.on_path
            .lock()
            .ok()
            .and_then(|guard| guard.get(program).cloned())
    }
}

/// What a [`RecordingCapability`] does when invoked.
#[derive(Debug, Clone)]
enum Behavior {
    Return(CapabilityOutput),
    Fail(String),
    Panic(String),
}

/// Capability that records its invocations.
#[derive(Debug, Clone)]
pub struct RecordingCapability {
    name: CapabilityName,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingCapability {
    /// Capability named `name` that returns [`CapabilityOutput::None`].
    #[must_use]
    pub fn new(name: CapabilityName) -> Self {
        Self {
            name,
            behavior: Behavior::Return(CapabilityOutput::None),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Return `output` from every call.
    #[must_use]
    pub fn returning(mut self, output: CapabilityOutput) -> Self {
        self.behavior = Behavior::Return(output);
        self
    }

    /// Fail every call with `message`.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Panic in every call with `message`.
    #[must_use]
    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Panic(message.into());
        self
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Invocations received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Capability for RecordingCapability {
    fn invoke(
        &self,
        _ctx: &InvocationContext,
        invocation: &Invocation,
    ) -> CapabilityResult<CapabilityOutput> {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(invocation.clone());
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        match &self.behavior {
            Behavior::Return(output) => Ok(output.clone()),
            Behavior::Fail(message) => Err(CapabilityError::InvocationFailed {
                capability: self.name.clone(),
                message: message.clone(),
            }),
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}
