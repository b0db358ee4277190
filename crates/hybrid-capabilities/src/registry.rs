//! Capability registry.

use std::collections::BTreeMap;

use hybrid_config::Catalog;
use hybrid_core::CapabilityName;
use hybrid_packages::RequirementTable;
use tracing::debug;

use crate::builtin::builtin_descriptors;
use crate::capability::{CapabilityOutput, Invocation, InvocationContext};
use crate::descriptor::{CapabilityDescriptor, Category};
use crate::error::{CapabilityError, CapabilityResult};

/// Name-keyed table of descriptors. Filled once, then read-only.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    descriptors: BTreeMap<CapabilityName, CapabilityDescriptor>,
}

impl CapabilityRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of the built-in capabilities, configured from `catalog`.
    #[must_use]
    pub fn builtin(catalog: &Catalog) -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors(catalog) {
            registry
                .descriptors
                .insert(descriptor.name().clone(), descriptor);
        }
        for name in catalog.names().filter(|n| !registry.descriptors.contains_key(*n)) {
            debug!(capability = %name, "catalog entry has no implementation, ignoring");
        }
        registry
    }

    /// Add a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::AlreadyRegistered`] for a duplicate name.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> CapabilityResult<()> {
        if self.descriptors.contains_key(descriptor.name()) {
            return Err(CapabilityError::AlreadyRegistered(descriptor.name().clone()));
        }
        self.descriptors
            .insert(descriptor.name().clone(), descriptor);
        Ok(())
    }

    /// Descriptor for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name.
    pub fn descriptor(&self, name: &CapabilityName) -> CapabilityResult<&CapabilityDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound(name.clone()))
    }

    /// Sorted names, optionally limited to one category.
    #[must_use]
    pub fn list(&self, category: Option<Category>) -> Vec<CapabilityName> {
        self.descriptors
            .values()
            .filter(|d| category.is_none_or(|c| d.category() == c))
            .map(|d| d.name().clone())
            .collect()
    }

    /// All descriptors, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.values()
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Requirements of every registered capability.
    #[must_use]
    pub fn requirement_table(&self) -> RequirementTable {
        let mut table = RequirementTable::new();
        for descriptor in self.descriptors.values() {
            table.insert(descriptor.requirement());
        }
        table
    }

    /// Invoke `name`, passing only the options it declares.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] for an unknown name, or whatever
    /// the entrypoint reports.
    pub fn invoke(
        &self,
        name: &CapabilityName,
        ctx: &InvocationContext,
        invocation: &Invocation,
    ) -> CapabilityResult<CapabilityOutput> {
        let descriptor = self.descriptor(name)?;
        let filtered = Invocation {
            options: invocation.options.restrict_to(descriptor.features()),
            ..invocation.clone()
        };
        descriptor.entrypoint().invoke(ctx, &filtered)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use hybrid_packages::{CommandOutput, CommandRunner, CommandSpec, ImportPaths, PackageResult};

    use super::*;
    use crate::capability::{Capability, InvocationOptions};
    use crate::descriptor::Feature;

    #[derive(Default)]
    struct Spy {
        seen: Mutex<Vec<Invocation>>,
    }

    impl Capability for Spy {
        fn invoke(
            &self,
            _ctx: &InvocationContext,
            invocation: &Invocation,
        ) -> CapabilityResult<CapabilityOutput> {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok(CapabilityOutput::None)
        }
    }

    struct NoRunner;

    impl CommandRunner for NoRunner {
        fn run(&self, _command: &CommandSpec) -> PackageResult<CommandOutput> {
            Ok(CommandOutput::default())
        }

        fn locate(&self, _program: &str) -> Option<PathBuf> {
            None
        }
    }

    fn name(s: &str) -> CapabilityName {
        CapabilityName::from_static(s)
    }

    #[test]
    fn test_builtin_listing() {
        let registry = CapabilityRegistry::builtin(&Catalog::bundled().unwrap());
        assert_eq!(registry.len(), 11);

        let tools: Vec<String> = registry
            .list(Some(Category::Tool))
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(tools, ["demucs", "vocos"]);
        assert_eq!(registry.list(Some(Category::Experimental)), [name("tortoise")]);

        let all = registry.list(None);
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);
    }

    #[test]
    fn test_unknown_name() {
        let registry = CapabilityRegistry::new();
        assert!(matches!(
            registry.descriptor(&name("nope")),
            Err(CapabilityError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = CapabilityRegistry::new();
        let spy: Arc<dyn Capability> = Arc::new(Spy::default());
        registry
            .register(CapabilityDescriptor::new(name("demo"), spy.clone()))
            .unwrap();
        let err = registry
            .register(CapabilityDescriptor::new(name("demo"), spy))
            .unwrap_err();
        assert!(matches!(err, CapabilityError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_invoke_filters_options() {
        let spy = Arc::new(Spy::default());
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                CapabilityDescriptor::new(name("demo"), spy.clone())
                    .with_features([Feature::Voice, Feature::Seed]),
            )
            .unwrap();

        let ctx = InvocationContext::new("python3", ImportPaths::new(), Arc::new(NoRunner));
        let invocation = Invocation::text("hi").with_options(InvocationOptions {
            voice: Some("af_heart".to_string()),
            lang: Some("en".to_string()),
            rate: Some(1.0),
            seed: Some(7),
        });
        registry.invoke(&name("demo"), &ctx, &invocation).unwrap();

        let seen = spy.seen.lock().unwrap();
        assert_eq!(seen[0].options.voice.as_deref(), Some("af_heart"));
        assert_eq!(seen[0].options.seed, Some(7));
        assert!(seen[0].options.lang.is_none());
        assert!(seen[0].options.rate.is_none());
    }

    #[test]
    fn test_requirement_table_carries_no_deps() {
        let registry = CapabilityRegistry::builtin(&Catalog::bundled().unwrap());
        let table = registry.requirement_table();
        assert_eq!(table.len(), registry.len());
        assert!(table.get(&name("kokoro")).unwrap().no_deps);
        assert!(!table.get(&name("gtts")).unwrap().no_deps);
    }
}
