//! Repeated cross-validation: the same run with consecutive seeds.

use crate::error::CvError;
use crate::evaluation::{Evaluation, Statistics};
use crate::execution::cross_validation::CrossValidationExecution;
use crate::execution::report::CrossValidationReport;
use crate::models::Classifier;
use tracing::info;

/// Runs a configured [`CrossValidationExecution`] `runs` times, run `r`
/// using seed `base + r`.
///
/// Stopping the execution's stop handle ends the current run and skips the
/// remaining ones. A run that reports a failure ends the sequence; its
/// report is the last one returned.
pub struct RepeatedCrossValidation<M: Classifier, S: Statistics = Evaluation> {
    execution: CrossValidationExecution<M, S>,
    runs: usize,
}

impl<M: Classifier, S: Statistics> RepeatedCrossValidation<M, S> {
    pub fn new(execution: CrossValidationExecution<M, S>, runs: usize) -> Result<Self, CvError> {
        if runs == 0 {
            return Err(CvError::config("runs must be at least 1"));
        }
        Ok(Self { execution, runs })
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn execution(&self) -> &CrossValidationExecution<M, S> {
        &self.execution
    }

    pub async fn execute(&mut self) -> Result<Vec<CrossValidationReport<M, S>>, CvError> {
        let base_seed = self.execution.seed();
        let mut reports = Vec::with_capacity(self.runs);

        for run in 0..self.runs {
            if self.execution.is_stopped() {
                break;
            }
            let seed = base_seed.wrapping_add(run as u64);
            self.execution.set_seed(seed);
            info!(run, runs = self.runs, seed, "Starting cross-validation run");

            let report = match self.execution.execute().await {
                Ok(report) => report,
                Err(e) => {
                    self.execution.set_seed(base_seed);
                    return Err(e);
                }
            };
            let failed = report.failure.is_some();
            reports.push(report);
            if failed {
                break;
            }
        }

        self.execution.set_seed(base_seed);
        Ok(reports)
    }
}
