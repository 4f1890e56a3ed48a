//! Majority-class baseline.

use super::Classifier;
use crate::data::{Dataset, Row};
use crate::error::CvError;

/// Predicts the training class distribution for every row.
#[derive(Debug, Clone, Default)]
pub struct ZeroR {
    distribution: Option<Vec<f64>>,
}

impl ZeroR {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for ZeroR {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        // Laplace-smoothed so unseen classes keep non-zero mass.
        let counts: Vec<f64> = data.class_counts().iter().map(|&c| c as f64 + 1.0).collect();
        let total: f64 = counts.iter().sum();
        self.distribution = Some(counts.into_iter().map(|c| c / total).collect());
        Ok(())
    }

    fn distribution(&self, _row: &Row) -> Result<Vec<f64>, CvError> {
        self.distribution
            .clone()
            .ok_or_else(|| CvError::model("ZeroR has not been trained"))
    }

    fn description(&self) -> String {
        "ZeroR".to_string()
    }
}
