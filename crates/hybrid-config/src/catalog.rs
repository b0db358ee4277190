//! Capability metadata and the package requirement manifest.
//!
//! Both files are JSON objects keyed by capability name. Each entry is
//! decoded on its own, so one malformed record is reported in
//! [`Catalog::rejected`] and skipped without affecting its neighbours. Only a
//! file that is not a JSON object at all fails as a whole.

use std::collections::BTreeMap;
use std::path::Path;

use hybrid_core::CapabilityName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

/// Embedded requirement manifest.
const BUNDLED_REQUIREMENTS: &str = include_str!("bundled/requirements.json");

/// Embedded capability metadata.
const BUNDLED_METADATA: &str = include_str!("bundled/capabilities.json");

/// Human-facing description of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    /// One-line description.
    pub description: String,
    /// Upstream project page.
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Headline package the capability is built on.
    #[serde(default)]
    pub package: Option<String>,
}

/// An entry that was skipped while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Source label (file path or embedded source).
    pub source: String,
    /// Raw key of the entry.
    pub key: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Loaded capability metadata and requirement manifest.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    metadata: BTreeMap<CapabilityName, CapabilityMetadata>,
    requirements: BTreeMap<CapabilityName, Vec<String>>,
    rejected: Vec<RejectedEntry>,
}

impl Catalog {
    /// Load only the embedded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded file is not a JSON object.
    pub fn bundled() -> ConfigResult<Self> {
        let mut catalog = Self::default();
        catalog.merge_requirements("<embedded requirements>", BUNDLED_REQUIREMENTS)?;
        catalog.merge_metadata("<embedded capabilities>", BUNDLED_METADATA)?;
        Ok(catalog)
    }

    /// Load the embedded catalog, then overlay the user files if present.
    ///
    /// # Errors
    ///
    /// Returns an error if an overlay exists but cannot be read or is not a
    /// JSON object.
    pub fn load(requirements_overlay: &Path, metadata_overlay: &Path) -> ConfigResult<Self> {
        let mut catalog = Self::bundled()?;

        if let Some(text) = read_optional(requirements_overlay)? {
            let label = requirements_overlay.display().to_string();
            let n = catalog.merge_requirements(&label, &text)?;
            info!(path = %label, entries = n, "loaded user requirement manifest");
        }
        if let Some(text) = read_optional(metadata_overlay)? {
            let label = metadata_overlay.display().to_string();
            let n = catalog.merge_metadata(&label, &text)?;
            info!(path = %label, entries = n, "loaded user capability metadata");
        }

        Ok(catalog)
    }

    /// Build a catalog from an explicit requirement manifest (no metadata).
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object.
    pub fn from_requirements_json(json: &str) -> ConfigResult<Self> {
        let mut catalog = Self::default();
        catalog.merge_requirements("<inline requirements>", json)?;
        Ok(catalog)
    }

    /// Merge a requirement manifest, replacing entries with the same key.
    ///
    /// Returns the number of entries accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object.
    pub fn merge_requirements(&mut self, source: &str, json: &str) -> ConfigResult<usize> {
        let entries = parse_entries::<Vec<String>>(source, json, &mut self.rejected)?;
        let mut accepted = 0_usize;
        for (name, packages) in entries {
            if let Some(pkg) = packages.iter().find(|p| p.trim().is_empty()) {
                self.reject(source, name.as_str(), format!("empty package specifier {pkg:?}"));
                continue;
            }
            self.requirements.insert(name, packages);
            accepted = accepted.saturating_add(1);
        }
        Ok(accepted)
    }

    /// Merge capability metadata, replacing entries with the same key.
    ///
    /// Returns the number of entries accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object.
    pub fn merge_metadata(&mut self, source: &str, json: &str) -> ConfigResult<usize> {
        let entries = parse_entries::<CapabilityMetadata>(source, json, &mut self.rejected)?;
        let n = entries.len();
        self.metadata.extend(entries);
        Ok(n)
    }

    /// Required package specifiers of a capability, in declaration order.
    #[must_use]
    pub fn requirements(&self, name: &CapabilityName) -> Option<&[String]> {
        self.requirements.get(name).map(Vec::as_slice)
    }

    /// Metadata of a capability.
    #[must_use]
    pub fn metadata(&self, name: &CapabilityName) -> Option<&CapabilityMetadata> {
        self.metadata.get(name)
    }

    /// All capability names that have a requirement entry, sorted.
    pub fn names(&self) -> impl Iterator<Item = &CapabilityName> {
        self.requirements.keys()
    }

    /// Entries skipped while loading.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    fn reject(&mut self, source: &str, key: &str, reason: String) {
        warn!(source, key, reason = %reason, "skipping catalog entry");
        self.rejected.push(RejectedEntry {
            source: source.to_string(),
            key: key.to_string(),
            reason,
        });
    }
}

fn read_optional(path: &Path) -> ConfigResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "catalog overlay not found, skipping");
            Ok(None)
        },
        Err(e) => Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Decode a JSON object entry by entry.
fn parse_entries<T: DeserializeOwned>(
    source: &str,
    json: &str,
    rejected: &mut Vec<RejectedEntry>,
) -> ConfigResult<Vec<(CapabilityName, T)>> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError {
            path: source.to_string(),
            source: e,
        })?;

    let mut out = Vec::with_capacity(object.len());
    for (key, value) in object {
        let name = match CapabilityName::new(key.as_str()) {
            Ok(n) => n,
            Err(e) => {
                warn!(source, key = %key, error = %e, "skipping catalog entry");
                rejected.push(RejectedEntry {
                    source: source.to_string(),
                    key,
                    reason: e.to_string(),
                });
                continue;
            },
        };
        match serde_json::from_value::<T>(value) {
            Ok(v) => out.push((name, v)),
            Err(e) => {
                warn!(source, key = %key, error = %e, "skipping catalog entry");
                rejected.push(RejectedEntry {
                    source: source.to_string(),
                    key,
                    reason: e.to_string(),
                });
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CapabilityName {
        CapabilityName::from_static(s)
    }

    #[test]
    fn test_bundled_catalog_loads_cleanly() {
        let catalog = Catalog::bundled().unwrap();
        assert!(catalog.rejected().is_empty(), "{:?}", catalog.rejected());
        assert_eq!(catalog.requirements(&name("gtts")).unwrap(), ["gTTS"]);
        assert!(catalog.metadata(&name("kokoro")).is_some());
        // Every capability with metadata also declares its packages.
        for key in catalog.metadata.keys() {
            assert!(catalog.requirements(key).is_some(), "{key} has no requirements");
        }
    }

    #[test]
    fn test_one_bad_entry_does_not_block_others() {
        let json = r#"{
            "demo": ["foo==1.0"],
            "broken": "not-a-list",
            "Bad Name": ["x"],
            "demo2": ["bar==2.0"]
        }"#;
        let catalog = Catalog::from_requirements_json(json).unwrap();
        let names: Vec<&str> = catalog.names().map(CapabilityName::as_str).collect();
        assert_eq!(names, ["demo", "demo2"]);
        assert_eq!(catalog.rejected().len(), 2);
    }

    #[test]
    fn test_metadata_entry_isolation() {
        let mut catalog = Catalog::default();
        let json = r#"{
            "good": {"description": "ok", "repo_url": "https://example.com", "package": "good"},
            "missing_desc": {"repo_url": "https://example.com"}
        }"#;
        let n = catalog.merge_metadata("test", json).unwrap();
        assert_eq!(n, 1);
        assert_eq!(catalog.metadata(&name("good")).unwrap().description, "ok");
        assert_eq!(catalog.rejected()[0].key, "missing_desc");
    }

    #[test]
    fn test_non_object_file_is_an_error() {
        assert!(matches!(
            Catalog::from_requirements_json("[1, 2]"),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_empty_specifier_rejected() {
        let catalog = Catalog::from_requirements_json(r#"{"demo": ["foo", " "]}"#).unwrap();
        assert!(catalog.requirements(&name("demo")).is_none());
        assert_eq!(catalog.rejected().len(), 1);
    }

    #[test]
    fn test_user_overlay_replaces_bundled_entry() {
        let dir = tempfile::tempdir().unwrap();
        let req = dir.path().join("requirements.json");
        std::fs::write(&req, r#"{"gtts": ["gTTS==2.5.1"], "custom": ["custom-tts"]}"#).unwrap();
        let meta = dir.path().join("capabilities.json");

        let catalog = Catalog::load(&req, &meta).unwrap();
        assert_eq!(catalog.requirements(&name("gtts")).unwrap(), ["gTTS==2.5.1"]);
        assert_eq!(catalog.requirements(&name("custom")).unwrap(), ["custom-tts"]);
        assert!(catalog.requirements(&name("kokoro")).is_some());
    }
}
