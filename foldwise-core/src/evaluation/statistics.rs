//! Evaluation statistics accumulated over test rows and merged across folds.

use crate::data::Dataset;
use crate::error::CvError;
use crate::evaluation::output::PredictionPrinter;
use crate::models::{Classifier, argmax};
use serde::{Deserialize, Serialize};

/// Result accumulator for one or more evaluated test sets.
///
/// `combine` must be associative: the engine merges per-fold results in
/// fold order and expects the same outcome as evaluating every fold into
/// one accumulator.
pub trait Statistics: Send + Sized + 'static {
    /// Empty accumulator whose class priors come from `data`.
    fn primed(data: &Dataset, discard_predictions: bool) -> Self;

    /// Replace the class priors with the distribution of `train`.
    fn set_priors(&mut self, train: &Dataset);

    /// Evaluate a trained model on every row of `test`, optionally echoing
    /// each prediction to `printer`.
    fn evaluate_model<M: Classifier>(
        &mut self,
        model: &M,
        test: &Dataset,
        printer: Option<&mut PredictionPrinter>,
    ) -> Result<(), CvError>;

    /// Fold `other` into `self`.
    fn combine(&mut self, other: &Self) -> Result<(), CvError>;

    /// Number of test rows evaluated so far.
    fn num_evaluated(&self) -> usize;
}

/// One retained prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub actual: usize,
    pub predicted: usize,
    pub distribution: Vec<f64>,
}

/// Classification statistics: confusion matrix, error sums against the
/// predicted distribution and against the class priors, and (unless
/// discarded) every individual prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    class_labels: Vec<String>,
    priors: Vec<f64>,
    confusion: Vec<Vec<u64>>,
    num_evaluated: usize,
    sum_abs_err: f64,
    sum_sq_err: f64,
    sum_prior_abs_err: f64,
    sum_prior_sq_err: f64,
    discard_predictions: bool,
    predictions: Vec<PredictionRecord>,
}

impl Evaluation {
    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn discards_predictions(&self) -> bool {
        self.discard_predictions
    }

    /// Individual predictions in evaluation order, `None` when discarded.
    pub fn predictions(&self) -> Option<&[PredictionRecord]> {
        if self.discard_predictions {
            None
        } else {
            Some(&self.predictions)
        }
    }

    /// Rows are actual classes, columns predicted classes.
    pub fn confusion_matrix(&self) -> &[Vec<u64>] {
        &self.confusion
    }

    /// Normalised class priors currently in effect.
    pub fn priors(&self) -> Vec<f64> {
        let total: f64 = self.priors.iter().sum();
        self.priors.iter().map(|p| p / total).collect()
    }

    pub fn correct(&self) -> u64 {
        (0..self.confusion.len()).map(|c| self.confusion[c][c]).sum()
    }

    pub fn incorrect(&self) -> u64 {
        self.num_evaluated as u64 - self.correct()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct() as f64, self.num_evaluated as f64)
    }

    pub fn kappa(&self) -> f64 {
        let n = self.num_evaluated as f64;
        if n == 0.0 {
            return f64::NAN;
        }
        let k = self.confusion.len();
        let mut expected = 0.0;
        for c in 0..k {
            let actual: u64 = self.confusion[c].iter().sum();
            let predicted: u64 = (0..k).map(|r| self.confusion[r][c]).sum();
            expected += actual as f64 * predicted as f64;
        }
        let pe = expected / (n * n);
        let po = self.correct() as f64 / n;
        if (1.0 - pe).abs() < f64::EPSILON {
            1.0
        } else {
            (po - pe) / (1.0 - pe)
        }
    }

    pub fn mean_absolute_error(&self) -> f64 {
        ratio(self.sum_abs_err, self.num_evaluated as f64)
    }

    pub fn root_mean_squared_error(&self) -> f64 {
        ratio(self.sum_sq_err, self.num_evaluated as f64).sqrt()
    }

    /// Absolute error relative to predicting the priors, in percent.
    pub fn relative_absolute_error(&self) -> f64 {
        100.0 * ratio(self.sum_abs_err, self.sum_prior_abs_err)
    }

    /// Squared error relative to predicting the priors, in percent.
    pub fn root_relative_squared_error(&self) -> f64 {
        100.0 * ratio(self.sum_sq_err, self.sum_prior_sq_err).sqrt()
    }

    pub fn precision(&self, class: usize) -> f64 {
        let predicted: u64 = self.confusion.iter().map(|row| row[class]).sum();
        ratio(self.confusion[class][class] as f64, predicted as f64)
    }

    pub fn recall(&self, class: usize) -> f64 {
        let actual: u64 = self.confusion[class].iter().sum();
        ratio(self.confusion[class][class] as f64, actual as f64)
    }

    pub fn f_measure(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        ratio(2.0 * p * r, p + r)
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            num_instances: self.num_evaluated,
            correct: self.correct(),
            incorrect: self.incorrect(),
            accuracy: self.accuracy(),
            kappa: self.kappa(),
            mean_absolute_error: self.mean_absolute_error(),
            root_mean_squared_error: self.root_mean_squared_error(),
            relative_absolute_error: self.relative_absolute_error(),
            root_relative_squared_error: self.root_relative_squared_error(),
            classes: self
                .class_labels
                .iter()
                .enumerate()
                .map(|(c, label)| ClassSummary {
                    label: label.clone(),
                    precision: self.precision(c),
                    recall: self.recall(c),
                    f_measure: self.f_measure(c),
                })
                .collect(),
            confusion_matrix: self.confusion.clone(),
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { f64::NAN } else { num / den }
}

fn class_priors(data: &Dataset) -> Vec<f64> {
    data.class_counts().iter().map(|&c| c as f64 + 1.0).collect()
}

/// Per-row error of `distribution` against the one-hot target, averaged
/// over classes: `(absolute, squared)`.
fn row_errors(distribution: &[f64], actual: usize) -> (f64, f64) {
    let k = distribution.len() as f64;
    let mut abs = 0.0;
    let mut sq = 0.0;
    for (c, &p) in distribution.iter().enumerate() {
        let target = if c == actual { 1.0 } else { 0.0 };
        let diff = p - target;
        abs += diff.abs();
        sq += diff * diff;
    }
    (abs / k, sq / k)
}

impl Statistics for Evaluation {
    fn primed(data: &Dataset, discard_predictions: bool) -> Self {
        let k = data.num_classes();
        Self {
            class_labels: data.class_labels().to_vec(),
            priors: class_priors(data),
            confusion: vec![vec![0; k]; k],
            num_evaluated: 0,
            sum_abs_err: 0.0,
            sum_sq_err: 0.0,
            sum_prior_abs_err: 0.0,
            sum_prior_sq_err: 0.0,
            discard_predictions,
            predictions: Vec::new(),
        }
    }

    fn set_priors(&mut self, train: &Dataset) {
        self.priors = class_priors(train);
    }

    fn evaluate_model<M: Classifier>(
        &mut self,
        model: &M,
        test: &Dataset,
        mut printer: Option<&mut PredictionPrinter>,
    ) -> Result<(), CvError> {
        let k = self.class_labels.len();
        if test.num_classes() != k {
            return Err(CvError::dataset(format!(
                "test data has {} classes, statistics expect {k}",
                test.num_classes()
            )));
        }
        let priors = self.priors();

        for row in test.rows() {
            let distribution = model.distribution(row)?;
            if distribution.len() != k {
                return Err(CvError::model(format!(
                    "{} returned {} probabilities for {k} classes",
                    model.description(),
                    distribution.len()
                )));
            }
            let predicted = argmax(&distribution);
            self.confusion[row.class][predicted] += 1;
            self.num_evaluated += 1;

            let (abs, sq) = row_errors(&distribution, row.class);
            self.sum_abs_err += abs;
            self.sum_sq_err += sq;
            let (prior_abs, prior_sq) = row_errors(&priors, row.class);
            self.sum_prior_abs_err += prior_abs;
            self.sum_prior_sq_err += prior_sq;

            if let Some(printer) = printer.as_deref_mut() {
                printer.print_prediction(row.class, &distribution);
            }
            if !self.discard_predictions {
                self.predictions.push(PredictionRecord {
                    actual: row.class,
                    predicted,
                    distribution,
                });
            }
        }
        Ok(())
    }

    fn combine(&mut self, other: &Self) -> Result<(), CvError> {
        if other.class_labels != self.class_labels {
            return Err(CvError::aggregation(format!(
                "cannot combine statistics over {} classes with statistics over {}",
                self.class_labels.len(),
                other.class_labels.len()
            )));
        }
        for (row, other_row) in self.confusion.iter_mut().zip(&other.confusion) {
            for (cell, other_cell) in row.iter_mut().zip(other_row) {
                *cell += other_cell;
            }
        }
        self.num_evaluated += other.num_evaluated;
        self.sum_abs_err += other.sum_abs_err;
        self.sum_sq_err += other.sum_sq_err;
        self.sum_prior_abs_err += other.sum_prior_abs_err;
        self.sum_prior_sq_err += other.sum_prior_sq_err;

        if self.discard_predictions || other.discard_predictions {
            // a partial prediction list would misalign with the index map
            self.discard_predictions = true;
            self.predictions.clear();
        } else {
            self.predictions.extend(other.predictions.iter().cloned());
        }
        Ok(())
    }

    fn num_evaluated(&self) -> usize {
        self.num_evaluated
    }
}

/// Serialisable digest of an [`Evaluation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub num_instances: usize,
    pub correct: u64,
    pub incorrect: u64,
    pub accuracy: f64,
    pub kappa: f64,
    pub mean_absolute_error: f64,
    pub root_mean_squared_error: f64,
    pub relative_absolute_error: f64,
    pub root_relative_squared_error: f64,
    pub classes: Vec<ClassSummary>,
    pub confusion_matrix: Vec<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

impl EvaluationSummary {
    pub fn to_json_pretty(&self) -> Result<String, CvError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Correctly Classified Instances     {:>8} {:>9.4} %",
            self.correct,
            self.accuracy * 100.0
        )?;
        writeln!(
            f,
            "Incorrectly Classified Instances   {:>8} {:>9.4} %",
            self.incorrect,
            (1.0 - self.accuracy) * 100.0
        )?;
        writeln!(f, "Kappa statistic                    {:>8.4}", self.kappa)?;
        writeln!(f, "Mean absolute error                {:>8.4}", self.mean_absolute_error)?;
        writeln!(f, "Root mean squared error            {:>8.4}", self.root_mean_squared_error)?;
        writeln!(
            f,
            "Relative absolute error            {:>8.4} %",
            self.relative_absolute_error
        )?;
        writeln!(
            f,
            "Root relative squared error        {:>8.4} %",
            self.root_relative_squared_error
        )?;
        writeln!(f, "Total Number of Instances          {:>8}", self.num_instances)?;
        writeln!(f)?;
        writeln!(f, "{:>10} {:>10} {:>10}  class", "precision", "recall", "f-measure")?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>10.3} {:>10.3} {:>10.3}  {}",
                class.precision, class.recall, class.f_measure, class.label
            )?;
        }
        Ok(())
    }
}
