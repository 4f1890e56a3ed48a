//! Outcome of one cross-validation run.

use crate::error::CvError;
use crate::evaluation::Evaluation;
use crate::folds::OriginalIndexMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a run produced.
///
/// A failed fold does not discard the run: `failure` names it and
/// `aggregate` still holds the folds merged before it. Callers that must not
/// read partial results use [`into_result`](Self::into_result).
#[derive(Debug)]
pub struct CrossValidationReport<M, S = Evaluation> {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Number of folds actually used.
    pub folds: usize,
    pub actual_num_threads: usize,
    /// Whether the sequential path evaluated the folds.
    pub single_threaded: bool,
    /// Merged statistics. `None` when a parallel run was stopped or never
    /// got to aggregation.
    pub aggregate: Option<S>,
    /// Per-fold statistics in fold order (parallel path only).
    pub fold_statistics: Option<Vec<S>>,
    /// Per-fold trained models in fold order (parallel path only).
    pub fold_models: Option<Vec<M>>,
    /// `None` when predictions are discarded.
    pub original_indices: Option<OriginalIndexMap>,
    /// Rendered predictions (sequential path with prediction output only).
    pub prediction_output: Option<String>,
    pub stopped: bool,
    pub failure: Option<CvError>,
}

impl<M, S> CrossValidationReport<M, S> {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.stopped
    }

    pub fn failure(&self) -> Option<&CvError> {
        self.failure.as_ref()
    }

    pub fn aggregate(&self) -> Option<&S> {
        self.aggregate.as_ref()
    }

    /// Turn a failed run into an error, dropping its partial results.
    pub fn into_result(mut self) -> Result<Self, CvError> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    pub fn metadata(&self) -> RunMetadata {
        RunMetadata {
            run_id: self.run_id,
            started_at: self.started_at,
            duration_ms: self.duration_ms,
            folds: self.folds,
            actual_num_threads: self.actual_num_threads,
            single_threaded: self.single_threaded,
            stopped: self.stopped,
            failed_fold: self.failure.as_ref().and_then(CvError::failed_fold),
            failure: self.failure.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable description of a run, without its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub folds: usize,
    pub actual_num_threads: usize,
    pub single_threaded: bool,
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_fold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZeroR;

    fn report(failure: Option<CvError>) -> CrossValidationReport<ZeroR, u32> {
        CrossValidationReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms: 3,
            folds: 5,
            actual_num_threads: 1,
            single_threaded: true,
            aggregate: Some(7),
            fold_statistics: None,
            fold_models: None,
            original_indices: None,
            prediction_output: None,
            stopped: false,
            failure,
        }
    }

    #[test]
    fn test_into_result_surfaces_failure() {
        let err = report(Some(CvError::fold_failed(2, "boom")))
            .into_result()
            .unwrap_err();
        assert_eq!(err.failed_fold(), Some(2));
        assert_eq!(report(None).into_result().unwrap().aggregate(), Some(&7));
    }

    #[test]
    fn test_metadata_serializes_failure() {
        let report = report(Some(CvError::fold_failed(1, "bad")));
        assert!(!report.is_success());
        let json = serde_json::to_value(report.metadata()).unwrap();
        assert_eq!(json["failed_fold"], 1);
        assert_eq!(json["failure"], "fold 1 failed: bad");
        assert_eq!(json["folds"], 5);
    }
}
