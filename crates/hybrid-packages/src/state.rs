//! The derived set of installed capabilities.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hybrid_core::CapabilityName;

/// Capabilities currently considered installed.
///
/// Owns its mutex so the foreground can read while a worker records an
/// install. The set is a cache: the install log and live probes are the
/// sources it is rebuilt from.
#[derive(Debug, Default)]
pub struct InstallState {
    inner: Mutex<BTreeSet<CapabilityName>>,
}

impl InstallState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<CapabilityName>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `name` is marked installed.
    #[must_use]
    pub fn contains(&self, name: &CapabilityName) -> bool {
        self.lock().contains(name)
    }

    /// Mark `name` installed. Returns `true` if it was not already.
    pub fn insert(&self, name: CapabilityName) -> bool {
        self.lock().insert(name)
    }

    /// Clear `name`. Returns `true` if it was marked.
    pub fn remove(&self, name: &CapabilityName) -> bool {
        self.lock().remove(name)
    }

    /// Replace the whole set (used by reconciliation).
    pub fn replace(&self, names: BTreeSet<CapabilityName>) {
        *self.lock() = names;
    }

    /// Sorted copy of the set.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<CapabilityName> {
        self.lock().clone()
    }

    /// Number of installed capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_insert_remove() {
        let state = InstallState::new();
        let demo = CapabilityName::from_static("demo");
        assert!(state.insert(demo.clone()));
        assert!(!state.insert(demo.clone()));
        assert!(state.contains(&demo));
        assert!(state.remove(&demo));
        assert!(state.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let state = Arc::new(InstallState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let name = CapabilityName::new(format!("cap{i}")).unwrap();
                    state.insert(name.clone());
                    let _ = state.snapshot();
                    state.contains(&name)
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(state.len(), 8);
    }
}
