//! Capability identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced when validating a [`CapabilityName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// The name was empty.
    #[error("capability name must not be empty")]
    Empty,

    /// The name contained a character outside `[a-z0-9_-]`.
    #[error("capability name must contain only lowercase alphanumerics, '_' and '-', got: {0}")]
    InvalidCharacter(String),

    /// The name started or ended with a separator.
    #[error("capability name must not start or end with a separator, got: {0}")]
    EdgeSeparator(String),
}

/// Unique key of a capability, such as `"edge_tts"` or `"kokoro"`.
///
/// Names are the keys of the requirement manifest and the install log, so
/// they must be non-empty, free of whitespace and `:` (the log delimiter),
/// and limited to lowercase alphanumerics, underscores and hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CapabilityName(String);

/// Deserialize with validation so crafted manifests cannot inject log syntax.
impl<'de> Deserialize<'de> for CapabilityName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl CapabilityName {
    /// Create a new `CapabilityName`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains invalid characters.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create a `CapabilityName` without validation (for tests and built-in tables).
    #[must_use]
    pub fn from_static(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a valid capability name.
    #[must_use]
    pub fn is_valid(name: &str) -> bool {
        Self::validate(name).is_ok()
    }

    fn validate(name: &str) -> Result<(), NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(NameError::InvalidCharacter(name.to_string()));
        }
        let is_sep = |c: char| c == '_' || c == '-';
        if name.starts_with(is_sep) || name.ends_with(is_sep) {
            return Err(NameError::EdgeSeparator(name.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for CapabilityName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
