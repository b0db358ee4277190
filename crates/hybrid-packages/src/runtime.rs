//! Numerical runtime (PyTorch) provisioning.
//!
//! Several capabilities install with `--no-deps` so they reuse one shared
//! torch build. That build is chosen here: the CUDA toolkit release reported
//! by `nvcc` picks the wheel index, and nothing is installed when torch,
//! torchvision and torchaudio are already present at one base version.

use std::fmt;
use std::sync::LazyLock;

use hybrid_core::CapabilityName;
use regex::Regex;
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::PackageResult;
use crate::installer::InstallOptions;
use crate::log::{InstallAction, InstallLogEntry};
use crate::orchestrator::Orchestrator;
use crate::spec::{DistributionName, PackageSpec};

/// Pseudo-capability name used in the install log.
pub const RUNTIME_CAPABILITY: &str = "runtime";

/// Distributions that make up the runtime.
pub const RUNTIME_PACKAGES: &[&str] = &["torch", "torchvision", "torchaudio"];

static NVCC_RELEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"release\s+(\d+)\.(\d+)").expect("invalid regex"));

/// CUDA toolkit release, e.g. `12.8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaVersion {
    /// Major release.
    pub major: u32,
    /// Minor release.
    pub minor: u32,
}

impl CudaVersion {
    /// Parse `nvcc --version` output.
    #[must_use]
    pub fn parse_nvcc(output: &str) -> Option<Self> {
        let caps = NVCC_RELEASE.captures(output)?;
        Some(Self {
            major: caps.get(1)?.as_str().parse().ok()?,
            minor: caps.get(2)?.as_str().parse().ok()?,
        })
    }

    /// Compact tag used in wheel index names (`12.8` → `128`).
    #[must_use]
    pub fn tag(self) -> String {
        format!("{}{}", self.major, self.minor)
    }
}

impl fmt::Display for CudaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Wheel index for the runtime packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeIndex {
    /// Nightly CUDA 12.8 builds (pre-release).
    NightlyCu128,
    /// CUDA 12.1.
    Cu121,
    /// CUDA 11.8.
    Cu118,
    /// CPU only.
    Cpu,
}

impl RuntimeIndex {
    /// Index for a detected toolkit; anything unrecognised gets CPU wheels.
    #[must_use]
    pub fn for_cuda(cuda: Option<CudaVersion>) -> Self {
        match cuda.map(CudaVersion::tag).as_deref() {
            Some("128") => Self::NightlyCu128,
            Some("121") => Self::Cu121,
            Some("118") => Self::Cu118,
            _ => Self::Cpu,
        }
    }

    /// Index URL.
    #[must_use]
    pub fn url(self) -> &'static str {
        match self {
            Self::NightlyCu128 => "https://download.pytorch.org/whl/nightly/cu128",
            Self::Cu121 => "https://download.pytorch.org/whl/cu121",
            Self::Cu118 => "https://download.pytorch.org/whl/cu118",
            Self::Cpu => "https://download.pytorch.org/whl/cpu",
        }
    }

    /// Whether the index only carries pre-releases.
    #[must_use]
    pub fn is_prerelease(self) -> bool {
        matches!(self, Self::NightlyCu128)
    }

    /// Install flags for this index.
    #[must_use]
    pub fn install_options(self) -> InstallOptions {
        InstallOptions {
            no_deps: false,
            index_url: Some(self.url().to_string()),
            pre: self.is_prerelease(),
        }
    }
}

/// Run `nvcc --version` if `nvcc` is on `PATH`.
#[must_use]
pub fn detect_cuda(runner: &dyn CommandRunner) -> Option<CudaVersion> {
    let nvcc = runner.locate("nvcc")?;
    let output = runner.run(&CommandSpec::new(nvcc).arg("--version")).ok()?;
    if !output.success() {
        return None;
    }
    CudaVersion::parse_nvcc(&output.stdout)
}

/// Version with any local suffix removed (`2.3.0+cu121` → `2.3.0`).
#[must_use]
pub fn base_version(version: &str) -> &str {
    version.split('+').next().unwrap_or(version)
}

/// Result of [`Orchestrator::provision_runtime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOutcome {
    /// All runtime packages are present at one base version.
    Compatible(String),
    /// The runtime was installed from this index.
    Installed(RuntimeIndex),
}

impl Orchestrator {
    /// Base version shared by all runtime packages, if they agree.
    #[must_use]
    pub fn compatible_runtime(&self) -> Option<String> {
        let mut versions = RUNTIME_PACKAGES.iter().map(|pkg| {
            self.probe
                .distribution_version(&DistributionName::normalize(pkg))
                .map(|v| base_version(&v).to_string())
        });
        let first = versions.next()??;
        for v in versions {
            if v? != first {
                debug!("runtime package versions disagree");
                return None;
            }
        }
        Some(first)
    }

    /// Install the numerical runtime unless a compatible one is present.
    ///
    /// # Errors
    ///
    /// Returns an error if no interpreter is available, the install fails,
    /// or the log cannot be written.
    pub fn provision_runtime(&self, runner: &dyn CommandRunner) -> PackageResult<RuntimeOutcome> {
        if let Some(version) = self.compatible_runtime() {
            info!(version = %version, "compatible runtime already present");
            return Ok(RuntimeOutcome::Compatible(version));
        }

        let cuda = detect_cuda(runner);
        let index = RuntimeIndex::for_cuda(cuda);
        info!(
            cuda = %cuda.map_or_else(|| "none".to_string(), |c| c.to_string()),
            index = index.url(),
            "installing runtime"
        );

        let packages: Vec<PackageSpec> = RUNTIME_PACKAGES
            .iter()
            .map(|p| PackageSpec::parse(p))
            .collect();
        let python = self.resolver.target_interpreter()?;
        self.installer.install(&python, &packages, &index.install_options())?;

        self.log.append(&InstallLogEntry::now(
            InstallAction::Install,
            CapabilityName::from_static(RUNTIME_CAPABILITY),
            RUNTIME_PACKAGES.iter().map(ToString::to_string).collect(),
        ))?;
        Ok(RuntimeOutcome::Installed(index))
    }
}
