//! Directory scaffolding for the Hybrid home directory.
//!
//! [`HybridHome`] holds all per-user state at `~/.hybrid_tts/` (or
//! `$HYBRID_HOME`): the dedicated isolated environment, the install log,
//! the preferences store and the user-level catalog overlays.
//!
//! # Layout
//!
//! ```text
//! ~/.hybrid_tts/                  (HybridHome)
//! ├── venv/                         (dedicated isolated environment)
//! ├── logs/
//! │   ├── install.log               (append-only install log)
//! │   └── hybrid.log.*              (runtime log files)
//! ├── preferences.json              (preferences store)
//! ├── requirements.json             (user requirement manifest overlay)
//! └── capabilities.json             (user capability metadata overlay)
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory location.
pub const HOME_ENV_VAR: &str = "HYBRID_HOME";

/// Name of the home directory under `$HOME`.
const DEFAULT_DIR_NAME: &str = ".hybrid_tts";

/// Global Hybrid home directory (`~/.hybrid_tts/` or `$HYBRID_HOME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridHome {
    root: PathBuf,
}

impl HybridHome {
    /// Resolve the home directory from the process environment.
    ///
    /// Checks `$HYBRID_HOME` first, then falls back to `$HOME/.hybrid_tts/`
    /// (`%USERPROFILE%` on Windows).
    ///
    /// # Errors
    ///
    /// Returns an error if `$HYBRID_HOME` is set but not absolute, or if no
    /// home directory variable is set at all.
    pub fn resolve() -> io::Result<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve the home directory using an explicit variable lookup.
    ///
    /// # Errors
    ///
    /// See [`HybridHome::resolve`].
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> io::Result<Self> {
        if let Some(custom) = lookup(HOME_ENV_VAR) {
            let p = PathBuf::from(&custom);
            if !p.is_absolute() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "HYBRID_HOME must be an absolute path",
                ));
            }
            return Ok(Self { root: p });
        }

        let home = lookup("HOME")
            .or_else(|| lookup("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "neither HYBRID_HOME nor HOME environment variable is set",
                )
            })?;

        Ok(Self {
            root: PathBuf::from(home).join(DEFAULT_DIR_NAME),
        })
    }

    /// Create from an explicit path (useful for testing).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure the root and `logs/` directories exist.
    ///
    /// The environment directory is not created here; the environment
    /// resolver bootstraps it on first use. On Unix the root is restricted
    /// to the owner (`0o700`).
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or permission setting fails.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(self.root(), std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    /// Root directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dedicated isolated environment (`~/.hybrid_tts/venv/`).
    #[must_use]
    pub fn venv_dir(&self) -> PathBuf {
        self.root.join("venv")
    }

    /// Logs directory (`~/.hybrid_tts/logs/`).
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Path to the append-only install log.
    #[must_use]
    pub fn install_log_path(&self) -> PathBuf {
        self.logs_dir().join("install.log")
    }

    /// Path to the preferences store.
    #[must_use]
    pub fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }

    /// Path to the user-level requirement manifest overlay.
    #[must_use]
    pub fn requirements_override_path(&self) -> PathBuf {
        self.root.join("requirements.json")
    }

    /// Path to the user-level capability metadata overlay.
    #[must_use]
    pub fn metadata_override_path(&self) -> PathBuf {
        self.root.join("capabilities.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        let home =
            HybridHome::resolve_with(lookup(&[(HOME_ENV_VAR, &path), ("HOME", "/home/x")]))
                .unwrap();
        assert_eq!(home.root(), dir.path());
    }

    #[test]
    fn test_resolve_default_under_home() {
        let home = HybridHome::resolve_with(lookup(&[("HOME", "/home/alex")])).unwrap();
        assert_eq!(home.root(), Path::new("/home/alex/.hybrid_tts"));
        assert_eq!(
            home.install_log_path(),
            PathBuf::from("/home/alex/.hybrid_tts/logs/install.log")
        );
    }

    #[test]
    fn test_resolve_rejects_relative_override() {
        let err = HybridHome::resolve_with(lookup(&[(HOME_ENV_VAR, "relative/path")]))
            .unwrap_err();
        assert!(err.to_string().contains("absolute"), "got: {err}");
    }

    #[test]
    fn test_resolve_without_any_home() {
        let err = HybridHome::resolve_with(lookup(&[])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_ensure_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let home = HybridHome::from_path(dir.path().join("home"));
        home.ensure().unwrap();
        assert!(home.logs_dir().is_dir());
        assert!(!home.venv_dir().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let home = HybridHome::from_path(dir.path().join("home"));
        home.ensure().unwrap();

        let perms = std::fs::metadata(home.root()).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700);
    }
}
