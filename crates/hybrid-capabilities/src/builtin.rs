//! The capabilities shipped with Hybrid.

use std::sync::Arc;

use hybrid_config::Catalog;
use hybrid_core::CapabilityName;
use tracing::warn;

use crate::descriptor::{CapabilityDescriptor, Category, Feature};
use crate::python::PythonEntrypoint;

/// Python package the backends live in.
pub const BACKEND_PACKAGE: &str = "hybrid_backends";

struct Builtin {
    name: &'static str,
    function: &'static str,
    features: &'static [Feature],
    category: Category,
    no_deps: bool,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "pyttsx3",
        function: "synthesize",
        features: &[Feature::Voice, Feature::Rate],
        category: Category::Synthesis,
        no_deps: false,
    },
    Builtin {
        name: "gtts",
        function: "synthesize",
        features: &[Feature::Lang],
        category: Category::Synthesis,
        no_deps: false,
    },
    Builtin {
        name: "edge_tts",
        function: "synthesize",
        features: &[Feature::Voice, Feature::Rate],
        category: Category::Synthesis,
        no_deps: false,
    },
    Builtin {
        name: "kokoro",
        function: "synthesize",
        features: &[Feature::Voice, Feature::Rate, Feature::Seed],
        category: Category::Synthesis,
        no_deps: true,
    },
    Builtin {
        name: "bark",
        function: "synthesize",
        features: &[Feature::Voice],
        category: Category::Synthesis,
        no_deps: false,
    },
    Builtin {
        name: "tortoise",
        function: "synthesize",
        features: &[Feature::Voice, Feature::Seed],
        category: Category::Experimental,
        no_deps: true,
    },
    Builtin {
        name: "chatterbox",
        function: "synthesize",
        features: &[Feature::Seed],
        category: Category::Synthesis,
        no_deps: true,
    },
    Builtin {
        name: "mms",
        function: "synthesize",
        features: &[Feature::Lang, Feature::Rate],
        category: Category::Synthesis,
        no_deps: false,
    },
    Builtin {
        name: "vocos",
        function: "enhance",
        features: &[Feature::File],
        category: Category::Tool,
        no_deps: false,
    },
    Builtin {
        name: "demucs",
        function: "separate",
        features: &[Feature::File],
        category: Category::Tool,
        no_deps: false,
    },
    Builtin {
        name: "whisper",
        function: "transcribe",
        features: &[Feature::File],
        category: Category::Transcriber,
        no_deps: false,
    },
];

/// Descriptors for the built-in capabilities.
///
/// Packages and metadata come from `catalog`; a capability the catalog has
/// no requirement entry for is registered with no packages.
#[must_use]
pub fn builtin_descriptors(catalog: &Catalog) -> Vec<CapabilityDescriptor> {
    BUILTINS
        .iter()
        .map(|b| {
            let name = CapabilityName::from_static(b.name);
            let entrypoint =
                PythonEntrypoint::new(name.clone(), format!("{BACKEND_PACKAGE}.{}", b.name), b.function);
            let packages = catalog.requirements(&name).unwrap_or_else(|| {
                warn!(capability = b.name, "no requirement entry, registering without packages");
                &[]
            });

            let mut descriptor = CapabilityDescriptor::new(name.clone(), Arc::new(entrypoint))
                .with_packages(packages)
                .with_features(b.features.iter().copied())
                .with_category(b.category);
            if b.no_deps {
                descriptor = descriptor.without_dependency_resolution();
            }
            if let Some(metadata) = catalog.metadata(&name) {
                descriptor = descriptor.with_metadata(metadata.clone());
            }
            descriptor
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_has_bundled_packages() {
        let catalog = Catalog::bundled().unwrap();
        for descriptor in builtin_descriptors(&catalog) {
            assert!(
                !descriptor.required_packages().is_empty(),
                "{} has no packages",
                descriptor.name()
            );
            assert!(descriptor.metadata().is_some(), "{} has no metadata", descriptor.name());
        }
    }

    #[test]
    fn test_bark_probes_extension_module() {
        let catalog = Catalog::bundled().unwrap();
        let bark = builtin_descriptors(&catalog)
            .into_iter()
            .find(|d| d.name().as_str() == "bark")
            .unwrap();
        let first = &bark.required_packages()[0];
        assert!(first.is_vcs());
        assert_eq!(first.import_name(), "extension_bark");
    }

    #[test]
    fn test_shared_runtime_capabilities_skip_dependency_resolution() {
        let catalog = Catalog::bundled().unwrap();
        let no_deps: Vec<String> = builtin_descriptors(&catalog)
            .iter()
            .filter(|d| d.no_dependency_resolution())
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(no_deps, ["kokoro", "tortoise", "chatterbox"]);
    }
}
