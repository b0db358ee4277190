//! Uninstall retention policy.
//!
//! A package is kept if any *other* installed capability declares a package
//! with the same distribution name, no matter how many do. This is a binary
//! keep/remove decision; there is no per-package counter.

use std::collections::HashSet;

use crate::spec::{DistributionName, PackageSpec};

/// Partition of one capability's packages for uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Still required by another installed capability.
    pub retain: Vec<PackageSpec>,
    /// Safe to uninstall.
    pub remove: Vec<PackageSpec>,
}

impl RetentionPlan {
    /// Distribution names to pass to the uninstaller, deduplicated, in order.
    #[must_use]
    pub fn removal_names(&self) -> Vec<DistributionName> {
        let mut seen = HashSet::new();
        self.remove
            .iter()
            .map(|s| s.name().clone())
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

/// Split `packages` into retained and removable sets.
///
/// `still_required` is the union of distribution names declared by every
/// other installed capability. Input order is preserved in both halves.
#[must_use]
pub fn plan_removal<'a>(
    packages: &[PackageSpec],
    still_required: impl IntoIterator<Item = &'a DistributionName>,
) -> RetentionPlan {
    let required: HashSet<&DistributionName> = still_required.into_iter().collect();
    let (retain, remove) = packages
        .iter()
        .cloned()
        .partition(|spec| required.contains(spec.name()));
    RetentionPlan { retain, remove }
}
