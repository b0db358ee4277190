//! Per-capability package requirements.

use std::collections::BTreeMap;

use hybrid_core::CapabilityName;

use crate::spec::{DistributionName, PackageSpec};

/// What one capability needs installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Capability that declares the packages.
    pub capability: CapabilityName,
    /// Required packages, in declaration order.
    pub packages: Vec<PackageSpec>,
    /// Install without resolving transitive dependencies.
    pub no_deps: bool,
}

impl Requirement {
    /// Parse `packages` into a requirement for `capability`.
    #[must_use]
    pub fn new<S: AsRef<str>>(capability: CapabilityName, packages: &[S], no_deps: bool) -> Self {
        Self {
            capability,
            packages: packages.iter().map(|p| PackageSpec::parse(p.as_ref())).collect(),
            no_deps,
        }
    }
}

/// Requirements of every known capability, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct RequirementTable {
    entries: BTreeMap<CapabilityName, Requirement>,
}

impl RequirementTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a requirement.
    pub fn insert(&mut self, requirement: Requirement) {
        self.entries
            .insert(requirement.capability.clone(), requirement);
    }

    /// Builder form of [`RequirementTable::insert`].
    #[must_use]
    pub fn with(mut self, requirement: Requirement) -> Self {
        self.insert(requirement);
        self
    }

    /// Requirement of `name`.
    #[must_use]
    pub fn get(&self, name: &CapabilityName) -> Option<&Requirement> {
        self.entries.get(name)
    }

    /// All requirements, sorted by capability name.
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.values()
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distribution names declared by every capability in `installed`
    /// except `exclude`.
    pub fn declared_by<'a>(
        &'a self,
        installed: impl IntoIterator<Item = &'a CapabilityName> + 'a,
        exclude: &'a CapabilityName,
    ) -> impl Iterator<Item = &'a DistributionName> + 'a {
        installed
            .into_iter()
            .filter(move |name| *name != exclude)
            .filter_map(|name| self.entries.get(name))
            .flat_map(|req| req.packages.iter().map(PackageSpec::name))
    }
}
