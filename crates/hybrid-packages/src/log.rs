//! Append-only install log.
//!
//! # Format
//!
//! One UTF-8 line per action:
//!
//! ```text
//! <ISO-8601 timestamp> <action> <capability>: <spec>, <spec>, ...
//! ```
//!
//! `<action>` is `install`, `uninstall` or `skip_uninstall`. Lines are only
//! ever appended. Whitespace around commas inside a specifier
//! (`pkg>=1, <2`) is dropped on write, so `", "` only ever separates
//! specifiers. Timestamps without an offset (as written by older
//! front ends) are read as UTC.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use hybrid_core::CapabilityName;
use tracing::{debug, warn};

use crate::error::{PackageError, PackageResult};

/// What happened to a capability's packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallAction {
    /// Packages were installed.
    Install,
    /// Packages were removed.
    Uninstall,
    /// Packages were kept because another installed capability needs them.
    SkipUninstall,
}

impl InstallAction {
    /// Log keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::SkipUninstall => "skip_uninstall",
        }
    }
}

impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "uninstall" => Ok(Self::Uninstall),
            "skip_uninstall" => Ok(Self::SkipUninstall),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLogEntry {
    /// When the action completed.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub action: InstallAction,
    /// Capability the action applied to.
    pub capability: CapabilityName,
    /// Package specifiers affected, as written in the manifest.
    pub packages: Vec<String>,
}

impl InstallLogEntry {
    /// Entry stamped with the current time.
    #[must_use]
    pub fn now(action: InstallAction, capability: CapabilityName, packages: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            capability,
            packages,
        }
    }

    /// Render as a log line (without the trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.action,
            self.capability,
            self.packages
                .iter()
                .map(|p| compact_commas(p))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    /// Parse one log line.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed field.
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let line = line.trim_end();
        let (ts, rest) = line.split_once(' ').ok_or("missing action")?;
        let (action, rest) = rest.split_once(' ').ok_or("missing capability")?;
        let (name, packages) = rest.split_once(':').ok_or("missing ':' separator")?;

        let timestamp = parse_timestamp(ts)?;
        let action = action.parse()?;
        let capability = CapabilityName::new(name.trim()).map_err(|e| e.to_string())?;
        let packages = packages.trim();
        let packages = if packages.is_empty() {
            Vec::new()
        } else {
            packages.split(", ").map(|p| p.trim().to_string()).collect()
        };

        Ok(Self {
            timestamp,
            action,
            capability,
            packages,
        })
    }
}

/// `pkg>=1, <2` -> `pkg>=1,<2`.
fn compact_commas(spec: &str) -> String {
    spec.split(',').map(str::trim).collect::<Vec<_>>().join(",")
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("bad timestamp {ts:?}: {e}"))
}

/// Handle to the install log file.
#[derive(Debug, Clone)]
pub struct InstallLog {
    path: PathBuf,
}

impl InstallLog {
    /// Log stored at `path`. Nothing is touched until the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, creating the directory and file if absent.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Log`] if the directory cannot be created or the
    /// line cannot be written.
    pub fn append(&self, entry: &InstallLogEntry) -> PackageResult<()> {
        let log_err = |e| PackageError::Log {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(log_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(log_err)?;
        writeln!(file, "{}", entry.to_line()).map_err(log_err)?;
        debug!(
            action = %entry.action,
            capability = %entry.capability,
            packages = entry.packages.len(),
            "appended install log entry"
        );
        Ok(())
    }

    /// All well-formed entries in file order.
    ///
    /// A missing file is an empty log. Malformed lines are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Log`] if the file exists but cannot be read.
    pub fn entries(&self) -> PackageResult<Vec<InstallLogEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PackageError::Log {
                    path: self.path.clone(),
                    source: e,
                });
            },
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match InstallLogEntry::parse_line(line) {
                Ok(entry) => entries.push(entry),
                Err(reason) => warn!(
                    path = %self.path.display(),
                    line = idx.saturating_add(1),
                    reason = %reason,
                    "skipping malformed install log line"
                ),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CapabilityName {
        CapabilityName::from_static(s)
    }

    #[test]
    fn test_line_format() {
        let entry = InstallLogEntry {
            timestamp: DateTime::parse_from_rfc3339("2025-03-01T10:20:30Z")
                .unwrap()
                .with_timezone(&Utc),
            action: InstallAction::SkipUninstall,
            capability: name("demo"),
            packages: vec!["bar==2.0".to_string()],
        };
        assert_eq!(
            entry.to_line(),
            "2025-03-01T10:20:30.000000Z skip_uninstall demo: bar==2.0"
        );
        assert_eq!(InstallLogEntry::parse_line(&entry.to_line()).unwrap(), entry);
    }

    #[test]
    fn test_specifier_with_comma_stays_one_entry() {
        let entry = InstallLogEntry::now(
            InstallAction::Install,
            name("demo"),
            vec!["pkg>=1, <2".to_string(), "foo".to_string()],
        );
        let line = entry.to_line();
        assert!(line.ends_with("install demo: pkg>=1,<2, foo"));

        let parsed = InstallLogEntry::parse_line(&line).unwrap();
        assert_eq!(parsed.packages, ["pkg>=1,<2", "foo"]);
        assert_eq!(parsed.capability, entry.capability);
    }

    #[test]
    fn test_parse_legacy_timestamp_and_vcs_spec() {
        let line = "2024-11-05T08:00:01.123456 install bark: \
                    extension_bark @ git+https://github.com/x/extension_bark@main, soundfile";
        let entry = InstallLogEntry::parse_line(line).unwrap();
        assert_eq!(entry.action, InstallAction::Install);
        assert_eq!(entry.capability, name("bark"));
        assert_eq!(
            entry.packages,
            [
                "extension_bark @ git+https://github.com/x/extension_bark@main",
                "soundfile"
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(InstallLogEntry::parse_line("hello").is_err());
        assert!(InstallLogEntry::parse_line("2025-01-01T00:00:00Z explode demo: x").is_err());
        assert!(InstallLogEntry::parse_line("yesterday install demo: x").is_err());
    }

    #[test]
    fn test_append_creates_directory_and_preserves_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = InstallLog::new(dir.path().join("logs").join("install.log"));
        assert!(log.entries().unwrap().is_empty());

        log.append(&InstallLogEntry::now(
            InstallAction::Install,
            name("demo"),
            vec!["foo==1.0".into(), "bar==2.0".into()],
        ))
        .unwrap();
        let first = std::fs::read_to_string(log.path()).unwrap();

        log.append(&InstallLogEntry::now(
            InstallAction::Uninstall,
            name("demo"),
            vec!["foo==1.0".into()],
        ))
        .unwrap();
        let second = std::fs::read_to_string(log.path()).unwrap();

        assert!(second.starts_with(&first));
        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, InstallAction::Uninstall);
    }

    #[test]
    fn test_entries_skip_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.log");
        std::fs::write(
            &path,
            "2025-01-01T00:00:00Z install demo: foo\nnot a log line\n\n\
             2025-01-02T00:00:00Z uninstall demo: foo\n",
        )
        .unwrap();
        let entries = InstallLog::new(&path).entries().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_append_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the log directory should be.
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "").unwrap();
        let log = InstallLog::new(blocker.join("install.log"));
        let err = log
            .append(&InstallLogEntry::now(InstallAction::Install, name("demo"), vec![]))
            .unwrap_err();
        assert!(matches!(err, PackageError::Log { .. }));
    }
}
