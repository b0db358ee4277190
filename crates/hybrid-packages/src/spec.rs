//! Package specifier parsing and distribution-name normalization.
//!
//! Parses requirement strings such as `name`, `name==1.2.3`,
//! `name[extra]>=2,<3; python_version>"3.9"` and
//! `name @ git+https://host/repo@ref`. Every form reduces to a
//! [`DistributionName`], which is what probes and the retention policy
//! compare. Parsing never fails: a string the structured grammar rejects
//! falls back to "everything before the first whitespace or `@`".

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `name [extras] rest`, where the name follows the package-name grammar.
static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*?)\s*$")
        .expect("invalid regex")
});

/// Runs of separators collapse to a single `-` when normalizing.
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("invalid regex"));

/// Version comparison operators accepted after the name.
const VERSION_OPERATORS: &[&str] = &["===", "==", "!=", "~=", ">=", "<=", ">", "<"];

/// Normalized, comparable package identity.
///
/// Lowercase, with every run of `-`, `_` and `.` collapsed to one `-`, so
/// `Foo_Bar`, `foo-bar` and `foo.bar` are the same distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributionName(String);

impl DistributionName {
    /// Normalize a raw distribution name.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        Self(SEPARATORS.replace_all(&lower, "-").into_owned())
    }

    /// Get the normalized string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The conventional top-level module name (`extension-bark` → `extension_bark`).
    #[must_use]
    pub fn import_name(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl fmt::Display for DistributionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// The package index, optionally constrained (e.g. `==1.0`, `>=2,<3`).
    Index {
        /// Version constraint text, if any.
        constraint: Option<String>,
    },
    /// A direct reference (`name @ <url>`), usually a VCS URL.
    Url(String),
}

/// A requirement as written, plus its derived distribution name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    raw: String,
    name: DistributionName,
    extras: Vec<String>,
    source: SpecSource,
}

impl PackageSpec {
    /// Parse a requirement string.
    ///
    /// Uses the structured grammar when it matches and the naive
    /// whitespace/`@` split otherwise.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(spec) = Self::parse_structured(raw) {
            return spec;
        }
        debug!(spec = raw, "falling back to naive specifier split");
        Self::parse_fallback(raw)
    }

    /// Parse with the structured grammar only.
    #[must_use]
    pub fn parse_structured(raw: &str) -> Option<Self> {
        let caps = REQUIREMENT.captures(raw)?;
        let name = caps.get(1)?.as_str();
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let rest = caps.get(3).map_or("", |m| m.as_str());

        // Environment markers after `;` do not change identity.
        let requirement = rest.split(';').next().unwrap_or_default().trim();

        let source = if requirement.is_empty() {
            SpecSource::Index { constraint: None }
        } else if let Some(url) = requirement.strip_prefix('@') {
            let url = url.trim();
            if url.is_empty() {
                return None;
            }
            SpecSource::Url(url.to_string())
        } else if VERSION_OPERATORS.iter().any(|op| requirement.starts_with(op))
            || requirement.starts_with('(')
        {
            SpecSource::Index {
                constraint: Some(requirement.to_string()),
            }
        } else {
            return None;
        };

        Some(Self {
            raw: raw.trim().to_string(),
            name: DistributionName::normalize(name),
            extras,
            source,
        })
    }

    /// Parse by keeping everything before the first whitespace or `@`.
    #[must_use]
    pub fn parse_fallback(raw: &str) -> Self {
        let trimmed = raw.trim();
        let name = trimmed
            .split(|c: char| c.is_whitespace() || c == '@')
            .next()
            .unwrap_or_default();
        Self {
            raw: trimmed.to_string(),
            name: DistributionName::normalize(name),
            extras: Vec::new(),
            source: SpecSource::Index { constraint: None },
        }
    }

    /// The specifier as written (trimmed).
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized distribution name.
    #[must_use]
    pub fn name(&self) -> &DistributionName {
        &self.name
    }

    /// Requested extras.
    #[must_use]
    pub fn extras(&self) -> &[String] {
        &self.extras
    }

    /// Where the package comes from.
    #[must_use]
    pub fn source(&self) -> &SpecSource {
        &self.source
    }

    /// Module name to probe when distribution metadata is unavailable.
    #[must_use]
    pub fn import_name(&self) -> String {
        self.name.import_name()
    }

    /// Whether the package is fetched from a version-control URL.
    #[must_use]
    pub fn is_vcs(&self) -> bool {
        matches!(&self.source, SpecSource::Url(u)
            if ["git+", "hg+", "svn+", "bzr+"].iter().any(|p| u.starts_with(p)))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_forms_share_a_name() {
        for raw in ["name==1.2.3", "name", "name @ git+https://host/repo"] {
            assert_eq!(PackageSpec::parse(raw).name().as_str(), "name", "{raw}");
        }
    }

    #[test]
    fn test_normalization() {
        assert_eq!(DistributionName::normalize("gTTS").as_str(), "gtts");
        assert_eq!(DistributionName::normalize("Foo__Bar.baz").as_str(), "foo-bar-baz");
        assert_eq!(
            PackageSpec::parse("extension_kokoro @ git+https://github.com/x/extension_kokoro@main")
                .import_name(),
            "extension_kokoro"
        );
    }

    #[test]
    fn test_version_constraint() {
        let spec = PackageSpec::parse("torch>=2.1,<3");
        assert_eq!(spec.name().as_str(), "torch");
        assert_eq!(
            spec.source(),
            &SpecSource::Index {
                constraint: Some(">=2.1,<3".to_string())
            }
        );
        assert!(!spec.is_vcs());
    }

    #[test]
    fn test_extras_and_markers() {
        let spec = PackageSpec::parse("uvicorn[standard] ; python_version >= \"3.9\"");
        assert_eq!(spec.name().as_str(), "uvicorn");
        assert_eq!(spec.extras(), ["standard"]);
        assert_eq!(spec.source(), &SpecSource::Index { constraint: None });
    }

    #[test]
    fn test_vcs_reference() {
        let spec = PackageSpec::parse("extension_bark @ git+https://github.com/x/extension_bark@main");
        assert!(spec.is_vcs());
        assert_eq!(spec.name().as_str(), "extension-bark");
        assert_eq!(spec.raw(), "extension_bark @ git+https://github.com/x/extension_bark@main");
    }

    #[test]
    fn test_fallback_on_unstructured_input() {
        assert!(PackageSpec::parse_structured("foo bar baz").is_none());
        assert_eq!(PackageSpec::parse("foo bar baz").name().as_str(), "foo");
        assert_eq!(PackageSpec::parse("pkg@https://x/y.whl").name().as_str(), "pkg");
        assert_eq!(PackageSpec::parse_fallback("Name @ url").name().as_str(), "name");
    }
}
