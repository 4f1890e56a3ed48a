//! Trainable models evaluated by cross-validation.

pub mod naive_bayes;
pub mod registry;
pub mod zero_r;

pub use naive_bayes::GaussianNaiveBayes;
pub use registry::{BuiltinModel, ModelRegistry, default_registry};
pub use zero_r::ZeroR;

use crate::data::{Dataset, Row};
use crate::error::CvError;

/// A classifier that can be trained on a dataset and queried for class
/// probabilities.
///
/// `Clone` must produce an independent copy: every fold trains its own
/// clone, possibly on another thread.
pub trait Classifier: Clone + Send + Sync + 'static {
    /// Fit the model to `data`, replacing anything learned before.
    fn train(&mut self, data: &Dataset) -> Result<(), CvError>;

    /// Class-probability vector for `row`, one entry per class label.
    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError>;

    /// Short human-readable description, used in progress messages.
    fn description(&self) -> String;
}

/// Index of the largest entry; ties go to the lowest index.
pub fn argmax(distribution: &[f64]) -> usize {
    let mut best = 0;
    for (i, &p) in distribution.iter().enumerate() {
        if p > distribution[best] {
            best = i;
        }
    }
    best
}
