//! Tag-based model registry.
//!
//! Maps a model tag (as used in configuration and on the command line) to a
//! constructor. The default registry is built once on first use.

use super::{Classifier, GaussianNaiveBayes, ZeroR};
use crate::data::{Dataset, Row};
use crate::error::CvError;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The models that ship with foldwise.
#[derive(Debug, Clone)]
pub enum BuiltinModel {
    ZeroR(ZeroR),
    NaiveBayes(GaussianNaiveBayes),
}

impl Classifier for BuiltinModel {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        match self {
            Self::ZeroR(m) => m.train(data),
            Self::NaiveBayes(m) => m.train(data),
        }
    }

    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError> {
        match self {
            Self::ZeroR(m) => m.distribution(row),
            Self::NaiveBayes(m) => m.distribution(row),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::ZeroR(m) => m.description(),
            Self::NaiveBayes(m) => m.description(),
        }
    }
}

pub type ModelConstructor = fn() -> BuiltinModel;

struct Entry {
    description: &'static str,
    constructor: ModelConstructor,
}

/// Registry of model constructors keyed by tag.
#[derive(Default)]
pub struct ModelRegistry {
    entries: BTreeMap<&'static str, Entry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in model.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("zero_r", "Majority-class baseline", || {
            BuiltinModel::ZeroR(ZeroR::new())
        });
        registry.register("naive_bayes", "Gaussian naive Bayes", || {
            BuiltinModel::NaiveBayes(GaussianNaiveBayes::new())
        });
        registry
    }

    pub fn register(
        &mut self,
        tag: &'static str,
        description: &'static str,
        constructor: ModelConstructor,
    ) {
        self.entries.insert(
            tag,
            Entry {
                description,
                constructor,
            },
        );
    }

    /// Build a fresh, untrained model for `tag`.
    pub fn create(&self, tag: &str) -> Result<BuiltinModel, CvError> {
        self.entries
            .get(tag)
            .map(|e| (e.constructor)())
            .ok_or_else(|| {
                CvError::config(format!(
                    "unknown model '{tag}' (available: {})",
                    self.tags().join(", ")
                ))
            })
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// `(tag, description)` pairs in tag order.
    pub fn list(&self) -> Vec<(&'static str, &'static str)> {
        self.entries
            .iter()
            .map(|(tag, e)| (*tag, e.description))
            .collect()
    }
}

/// Shared registry of the built-in models.
pub fn default_registry() -> &'static ModelRegistry {
    static REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ModelRegistry::with_builtins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tags() {
        assert_eq!(default_registry().tags(), vec!["naive_bayes", "zero_r"]);
    }

    #[test]
    fn test_create_known_model() {
        let model = default_registry().create("zero_r").unwrap();
        assert_eq!(model.description(), "ZeroR");
    }

    #[test]
    fn test_unknown_model_lists_available() {
        let err = default_registry().create("svm").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown model 'svm'"));
        assert!(msg.contains("naive_bayes"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ModelRegistry::new();
        registry.register("baseline", "alias", || BuiltinModel::ZeroR(ZeroR::new()));
        assert_eq!(registry.list(), vec![("baseline", "alias")]);
    }
}
