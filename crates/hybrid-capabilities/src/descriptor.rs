//! Capability descriptors.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hybrid_config::CapabilityMetadata;
use hybrid_core::CapabilityName;
use hybrid_packages::{PackageSpec, Requirement};
use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Named option a capability accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Voice or speaker selection.
    Voice,
    /// Language code.
    Lang,
    /// Speaking rate.
    Rate,
    /// Random seed.
    Seed,
    /// Takes a file path as its primary input.
    File,
}

impl Feature {
    /// Keyword used on the command line and in invocation options.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Lang => "lang",
            Self::Rate => "rate",
            Self::Seed => "seed",
            Self::File => "file",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of capability, used for grouping in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Text to speech.
    Synthesis,
    /// Audio processing tool.
    Tool,
    /// Speech to text.
    Transcriber,
    /// Works, but not recommended for regular use.
    Experimental,
}

impl Category {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synthesis => "synthesis",
            Self::Tool => "tool",
            Self::Transcriber => "transcriber",
            Self::Experimental => "experimental",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthesis" => Ok(Self::Synthesis),
            "tool" => Ok(Self::Tool),
            "transcriber" => Ok(Self::Transcriber),
            "experimental" => Ok(Self::Experimental),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Static record for one capability.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    name: CapabilityName,
    entrypoint: Arc<dyn Capability>,
    required_packages: Vec<PackageSpec>,
    features: BTreeSet<Feature>,
    category: Category,
    no_dependency_resolution: bool,
    metadata: Option<CapabilityMetadata>,
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("required_packages", &self.required_packages)
            .field("features", &self.features)
            .field("category", &self.category)
            .field("no_dependency_resolution", &self.no_dependency_resolution)
            .finish_non_exhaustive()
    }
}

impl CapabilityDescriptor {
    /// Descriptor in the synthesis category with no packages or features.
    #[must_use]
    pub fn new(name: CapabilityName, entrypoint: Arc<dyn Capability>) -> Self {
        Self {
            name,
            entrypoint,
            required_packages: Vec::new(),
            features: BTreeSet::new(),
            category: Category::Synthesis,
            no_dependency_resolution: false,
            metadata: None,
        }
    }

    /// Set the required packages from specifier strings.
    #[must_use]
    pub fn with_packages<S: AsRef<str>>(mut self, packages: &[S]) -> Self {
        self.required_packages = packages
            .iter()
            .map(|p| PackageSpec::parse(p.as_ref()))
            .collect();
        self
    }

    /// Set the accepted options.
    #[must_use]
    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features = features.into_iter().collect();
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Install without resolving transitive dependencies.
    #[must_use]
    pub fn without_dependency_resolution(mut self) -> Self {
        self.no_dependency_resolution = true;
        self
    }

    /// Attach human-facing metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: CapabilityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &CapabilityName {
        &self.name
    }

    /// The callable doing the work.
    #[must_use]
    pub fn entrypoint(&self) -> &Arc<dyn Capability> {
        &self.entrypoint
    }

    /// Required packages, in declaration order.
    #[must_use]
    pub fn required_packages(&self) -> &[PackageSpec] {
        &self.required_packages
    }

    /// Accepted options.
    #[must_use]
    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    /// Whether `feature` is accepted.
    #[must_use]
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Category.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Whether installs skip transitive dependency resolution.
    #[must_use]
    pub fn no_dependency_resolution(&self) -> bool {
        self.no_dependency_resolution
    }

    /// Human-facing metadata, if any was loaded.
    #[must_use]
    pub fn metadata(&self) -> Option<&CapabilityMetadata> {
        self.metadata.as_ref()
    }

    /// Requirement entry for the package orchestrator.
    #[must_use]
    pub fn requirement(&self) -> Requirement {
        Requirement {
            capability: self.name.clone(),
            packages: self.required_packages.clone(),
            no_deps: self.no_dependency_resolution,
        }
    }
}
