//! The capability interface and its invocation types.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hybrid_packages::{CommandRunner, ImportPaths};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::descriptor::Feature;
use crate::error::CapabilityResult;

/// Primary input of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InvocationInput {
    /// Text to synthesize.
    Text(String),
    /// Audio file to process.
    File(PathBuf),
}

impl InvocationInput {
    /// The input as passed to the entrypoint.
    #[must_use]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::File(path) => Value::String(path.display().to_string()),
        }
    }
}

/// Named options. Unset options are never passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOptions {
    /// Voice or speaker.
    pub voice: Option<String>,
    /// Language code.
    pub lang: Option<String>,
    /// Speaking rate.
    pub rate: Option<f64>,
    /// Random seed.
    pub seed: Option<u64>,
}

impl InvocationOptions {
    /// Copy keeping only the options in `features`.
    #[must_use]
    pub fn restrict_to(&self, features: &BTreeSet<Feature>) -> Self {
        let keep = |f: Feature| features.contains(&f);
        Self {
            voice: self.voice.clone().filter(|_| keep(Feature::Voice)),
            lang: self.lang.clone().filter(|_| keep(Feature::Lang)),
            rate: self.rate.filter(|_| keep(Feature::Rate)),
            seed: self.seed.filter(|_| keep(Feature::Seed)),
        }
    }

    /// Keyword arguments for the set options.
    #[must_use]
    pub fn to_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        if let Some(voice) = &self.voice {
            kwargs.insert("voice".to_string(), json!(voice));
        }
        if let Some(lang) = &self.lang {
            kwargs.insert("lang".to_string(), json!(lang));
        }
        if let Some(rate) = self.rate {
            kwargs.insert("rate".to_string(), json!(rate));
        }
        if let Some(seed) = self.seed {
            kwargs.insert("seed".to_string(), json!(seed));
        }
        kwargs
    }

    /// Whether no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voice.is_none() && self.lang.is_none() && self.rate.is_none() && self.seed.is_none()
    }
}

/// One call to a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Primary input.
    pub input: InvocationInput,
    /// Where the result should be written, if the caller cares.
    pub output: Option<PathBuf>,
    /// Named options.
    pub options: InvocationOptions,
}

impl Invocation {
    /// Text invocation without output target or options.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            input: InvocationInput::Text(text.into()),
            output: None,
            options: InvocationOptions::default(),
        }
    }

    /// File invocation without output target or options.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            input: InvocationInput::File(path.into()),
            output: None,
            options: InvocationOptions::default(),
        }
    }

    /// Set the output target.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the options.
    #[must_use]
    pub fn with_options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }
}

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapabilityOutput {
    /// A single file.
    File(PathBuf),
    /// Several files (e.g. separated stems).
    Files(Vec<PathBuf>),
    /// Text (e.g. a transcript).
    Text(String),
    /// Nothing to report.
    None,
}

/// Where and how an entrypoint runs.
#[derive(Clone)]
pub struct InvocationContext {
    python: PathBuf,
    import_paths: ImportPaths,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("python", &self.python)
            .field("import_paths", &self.import_paths.snapshot())
            .finish_non_exhaustive()
    }
}

impl InvocationContext {
    /// Context running `python` through `runner`.
    #[must_use]
    pub fn new(
        python: impl Into<PathBuf>,
        import_paths: ImportPaths,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            python: python.into(),
            import_paths,
            runner,
        }
    }

    /// Interpreter to run in.
    #[must_use]
    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Extra import paths.
    #[must_use]
    pub fn import_paths(&self) -> &ImportPaths {
        &self.import_paths
    }

    /// Command runner.
    #[must_use]
    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

/// A unit of work a capability performs.
///
/// Implementations receive options already restricted to the descriptor's
/// feature set.
pub trait Capability: Send + Sync {
    /// Run the capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the work fails.
    fn invoke(
        &self,
        ctx: &InvocationContext,
        invocation: &Invocation,
    ) -> CapabilityResult<CapabilityOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_options() -> InvocationOptions {
        InvocationOptions {
            voice: Some("en-US-AriaNeural".to_string()),
            lang: Some("en".to_string()),
            rate: Some(1.5),
            seed: Some(42),
        }
    }

    #[test]
    fn test_restrict_drops_undeclared_options() {
        let features = BTreeSet::from([Feature::Lang]);
        let restricted = all_options().restrict_to(&features);
        assert_eq!(restricted.lang.as_deref(), Some("en"));
        assert!(restricted.voice.is_none());
        assert!(restricted.rate.is_none());
        assert!(restricted.seed.is_none());

        let kwargs = restricted.to_kwargs();
        assert_eq!(kwargs.len(), 1);
        assert_eq!(kwargs["lang"], "en");
    }

    #[test]
    fn test_no_features_means_no_kwargs() {
        let restricted = all_options().restrict_to(&BTreeSet::new());
        assert!(restricted.is_empty());
        assert!(restricted.to_kwargs().is_empty());
    }

    #[test]
    fn test_kwargs_types() {
        let kwargs = all_options().to_kwargs();
        assert_eq!(kwargs["seed"], 42);
        assert_eq!(kwargs["rate"], 1.5);
        assert_eq!(kwargs["voice"], "en-US-AriaNeural");
    }

    #[test]
    fn test_output_serialization() {
        let out = CapabilityOutput::Files(vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"kind":"files","value":["a.wav","b.wav"]}"#);
        assert_eq!(
            serde_json::from_str::<CapabilityOutput>(r#"{"kind":"none"}"#).unwrap(),
            CapabilityOutput::None
        );
    }
}
