use crate::error::ConvertError;
use crate::options::ConvertOptions;
use crate::transformers;
use serde_json::Value;
use std::fmt;

/// A single-step transformer: takes the document at the previous version and
/// returns it at the version it is registered under.
pub type ConvertStep =
    Box<dyn Fn(Value, &ConvertOptions) -> Result<Value, ConvertError> + Send + Sync>;

/// Ordered catalogue of known versions and the step that produces each one.
///
/// Order is registration order; it is the only ordering the engine uses, so
/// pre-release versions sit wherever they were registered.
pub struct VersionRegistry {
    steps: Vec<(String, ConvertStep)>,
}

impl VersionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// The registry of every AsyncAPI version from 1.0.0 to 3.1.0.
    pub fn asyncapi() -> Self {
        let mut registry = Self::new();
        for (version, step) in transformers::first::steps()
            .into_iter()
            .chain(transformers::second::steps())
            .chain(transformers::third::steps())
        {
            registry.register(version, step);
        }
        registry
    }

    /// Append `version` with the step converting its predecessor into it.
    /// Registering a known version again replaces its step in place.
    pub fn register(&mut self, version: impl Into<String>, step: ConvertStep) -> &mut Self {
        let version = version.into();
        match self.position(&version) {
            Some(index) => self.steps[index].1 = step,
            None => self.steps.push((version, step)),
        }
        self
    }

    /// Position of `version` in registry order.
    pub fn position(&self, version: &str) -> Option<usize> {
        self.steps.iter().position(|(known, _)| known == version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(version, _)| version.as_str())
    }

    /// The latest registered version
    pub fn latest_version(&self) -> Option<&str> {
        self.steps.last().map(|(version, _)| version.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The version and step at `index`.
    pub(crate) fn step(&self, index: usize) -> Option<(&str, &ConvertStep)> {
        self.steps
            .get(index)
            .map(|(version, step)| (version.as_str(), step))
    }
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self::asyncapi()
    }
}

impl fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.versions()).finish()
    }
}
