//! Gaussian naive Bayes over numeric attributes.

use super::Classifier;
use crate::data::{Dataset, Row};
use crate::error::CvError;

const MIN_VARIANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
struct ClassModel {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Per-class independent normal likelihoods with Laplace-smoothed priors.
#[derive(Debug, Clone, Default)]
pub struct GaussianNaiveBayes {
    classes: Vec<ClassModel>,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        !self.classes.is_empty()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        if data.is_empty() {
            return Err(CvError::model("cannot train naive Bayes on an empty dataset"));
        }
        let dims = data.num_attributes();
        let num_classes = data.num_classes();
        let counts = data.class_counts();
        let total = data.num_rows() as f64 + num_classes as f64;

        let mut sums = vec![vec![0.0; dims]; num_classes];
        for row in data.rows() {
            for (d, v) in row.values.iter().enumerate() {
                sums[row.class][d] += v;
            }
        }
        let means: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .map(|(s, &n)| s.into_iter().map(|v| if n > 0 { v / n as f64 } else { 0.0 }).collect())
            .collect();

        let mut sq = vec![vec![0.0; dims]; num_classes];
        for row in data.rows() {
            for (d, v) in row.values.iter().enumerate() {
                let diff = v - means[row.class][d];
                sq[row.class][d] += diff * diff;
            }
        }

        // pooled variance backs up classes with too few rows
        let mut pooled = vec![0.0; dims];
        for class_sq in &sq {
            for (d, v) in class_sq.iter().enumerate() {
                pooled[d] += v;
            }
        }
        let pooled: Vec<f64> = pooled
            .into_iter()
            .map(|v| (v / data.num_rows() as f64).max(MIN_VARIANCE))
            .collect();

        self.classes = (0..num_classes)
            .map(|c| {
                let n = counts[c];
                let variances = if n > 1 {
                    sq[c].iter().map(|v| (v / n as f64).max(MIN_VARIANCE)).collect()
                } else {
                    pooled.clone()
                };
                ClassModel {
                    log_prior: ((n as f64 + 1.0) / total).ln(),
                    means: means[c].clone(),
                    variances,
                }
            })
            .collect();
        Ok(())
    }

    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError> {
        if !self.is_trained() {
            return Err(CvError::model("naive Bayes has not been trained"));
        }
        let log_likelihoods: Vec<f64> = self
            .classes
            .iter()
            .map(|class| {
                let mut ll = class.log_prior;
                for ((x, mean), var) in row.values.iter().zip(&class.means).zip(&class.variances) {
                    let diff = x - mean;
                    ll -= 0.5 * (2.0 * std::f64::consts::PI * var).ln() + diff * diff / (2.0 * var);
                }
                ll
            })
            .collect();

        let max = log_likelihoods.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = log_likelihoods.iter().map(|ll| (ll - max).exp()).collect();
        let sum: f64 = exp.iter().sum();
        Ok(exp.into_iter().map(|e| e / sum).collect())
    }

    fn description(&self) -> String {
        "GaussianNaiveBayes".to_string()
    }
}
