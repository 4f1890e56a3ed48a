//! One fold's train-and-evaluate unit of work.

use crate::data::Dataset;
use crate::error::CvError;
use crate::evaluation::Statistics;
use crate::execution::progress::StatusSink;
use crate::execution::runner::Job;
use crate::models::Classifier;
use std::sync::Arc;
use tracing::{debug, warn};

/// Trains a private model clone on one fold's training rows and evaluates
/// it on the fold's test rows.
///
/// The job owns everything it touches, so it can run on any worker thread.
/// Failures are captured, not propagated: after `execute` either
/// [`statistics`](Self::statistics) is set or
/// [`execution_error`](Job::execution_error) is.
pub struct EvaluationJob<M, S> {
    fold: usize,
    model: Option<M>,
    train: Option<Dataset>,
    test: Option<Dataset>,
    discard_predictions: bool,
    status: Option<Arc<dyn StatusSink>>,
    statistics: Option<S>,
    execution_error: Option<String>,
}

impl<M: Classifier, S: Statistics> EvaluationJob<M, S> {
    pub fn new(
        fold: usize,
        model: M,
        train: Dataset,
        test: Dataset,
        discard_predictions: bool,
        status: Option<Arc<dyn StatusSink>>,
    ) -> Self {
        Self {
            fold,
            model: Some(model),
            train: Some(train),
            test: Some(test),
            discard_predictions,
            status,
            statistics: None,
            execution_error: None,
        }
    }

    pub fn fold(&self) -> usize {
        self.fold
    }

    pub fn statistics(&self) -> Option<&S> {
        self.statistics.as_ref()
    }

    pub fn take_statistics(&mut self) -> Option<S> {
        self.statistics.take()
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    /// The trained model; `None` once taken or after `clean_up`.
    pub fn take_model(&mut self) -> Option<M> {
        self.model.take()
    }

    fn pre_execute_check(&self) -> Result<(), String> {
        if self.model.is_none() {
            return Err("no model to train".to_string());
        }
        match &self.train {
            Some(train) if !train.is_empty() => {}
            _ => return Err("no training rows".to_string()),
        }
        match &self.test {
            Some(test) if !test.is_empty() => {}
            _ => return Err("no test rows".to_string()),
        }
        Ok(())
    }

    fn post_execute_check(&self) -> Result<(), String> {
        match &self.statistics {
            Some(_) => Ok(()),
            None => Err("no statistics produced".to_string()),
        }
    }

    fn run_fold(&mut self) -> Result<(), CvError> {
        let (Some(model), Some(train), Some(test)) =
            (self.model.as_mut(), self.train.as_ref(), self.test.as_ref())
        else {
            return Err(CvError::runner("job inputs released"));
        };
        model.train(train)?;
        let mut statistics = S::primed(train, self.discard_predictions);
        statistics.evaluate_model(&*model, test, None)?;
        self.statistics = Some(statistics);
        Ok(())
    }

    fn notify(&self, phase: &str) {
        if let (Some(sink), Some(model)) = (&self.status, &self.model) {
            sink.show_status(&format!(
                "Fold {} - {phase}: {}",
                self.fold,
                model.description()
            ));
        }
    }
}

impl<M: Classifier, S: Statistics> Job for EvaluationJob<M, S> {
    fn label(&self) -> String {
        format!("fold {}", self.fold)
    }

    fn execute(&mut self) {
        if let Err(message) = self.pre_execute_check() {
            warn!(fold = self.fold, %message, "Fold job rejected");
            self.record_failure(message);
            return;
        }

        self.notify("start");
        debug!(fold = self.fold, "Fold job started");
        match self.run_fold() {
            Ok(()) => {
                if let Err(message) = self.post_execute_check() {
                    self.record_failure(message);
                }
            }
            Err(e) => {
                warn!(fold = self.fold, error = %e, "Fold job failed");
                self.statistics = None;
                self.record_failure(e.to_string());
            }
        }
        debug!(
            fold = self.fold,
            failed = self.has_execution_error(),
            "Fold job finished"
        );
        self.notify("end");
    }

    fn record_failure(&mut self, message: String) {
        self.execution_error = Some(message);
    }

    fn execution_error(&self) -> Option<&str> {
        self.execution_error.as_deref()
    }

    fn clean_up(&mut self) {
        self.train = None;
        self.test = None;
        self.statistics = None;
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Row;
    use crate::evaluation::Evaluation;
    use crate::models::ZeroR;
    use std::sync::Mutex;

    fn data(classes: &[usize]) -> Dataset {
        Dataset::new(
            "jobs",
            vec!["x".into()],
            vec!["no".into(), "yes".into()],
            classes
                .iter()
                .enumerate()
                .map(|(i, &c)| Row::new(vec![i as f64], c))
                .collect(),
        )
        .unwrap()
    }

    #[derive(Clone)]
    struct Broken;

    impl Classifier for Broken {
        fn train(&mut self, _data: &Dataset) -> Result<(), CvError> {
            Err(CvError::model("cannot fit"))
        }

        fn distribution(&self, _row: &Row) -> Result<Vec<f64>, CvError> {
            Ok(vec![1.0, 0.0])
        }

        fn description(&self) -> String {
            "Broken".to_string()
        }
    }

    #[test]
    fn test_successful_job_produces_statistics() {
        let mut job: EvaluationJob<ZeroR, Evaluation> = EvaluationJob::new(
            3,
            ZeroR::default(),
            data(&[0, 0, 1]),
            data(&[0, 1]),
            false,
            None,
        );
        job.execute();
        assert!(!job.has_execution_error());
        assert_eq!(job.fold(), 3);
        let stats = job.take_statistics().unwrap();
        assert_eq!(stats.num_evaluated(), 2);
        assert!(job.take_model().is_some());
    }

    #[test]
    fn test_training_failure_is_captured() {
        let mut job: EvaluationJob<Broken, Evaluation> =
            EvaluationJob::new(1, Broken, data(&[0, 1]), data(&[1]), false, None);
        job.execute();
        assert!(job.statistics().is_none());
        assert!(job.execution_error().unwrap().contains("cannot fit"));
    }

    #[test]
    fn test_empty_test_rows_fail_fast() {
        let empty = data(&[]);
        let mut job: EvaluationJob<ZeroR, Evaluation> =
            EvaluationJob::new(0, ZeroR::default(), data(&[0, 1]), empty, false, None);
        job.execute();
        assert_eq!(job.execution_error(), Some("no test rows"));
    }

    #[test]
    fn test_missing_model_fails_fast() {
        let mut job: EvaluationJob<ZeroR, Evaluation> =
            EvaluationJob::new(0, ZeroR::default(), data(&[0, 1]), data(&[1]), false, None);
        job.take_model();
        job.execute();
        assert_eq!(job.execution_error(), Some("no model to train"));
    }

    #[test]
    fn test_status_messages_name_fold_and_model() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn StatusSink> = {
            let seen = seen.clone();
            Arc::new(move |msg: &str| seen.lock().unwrap().push(msg.to_string()))
        };
        let mut job: EvaluationJob<ZeroR, Evaluation> = EvaluationJob::new(
            2,
            ZeroR::default(),
            data(&[0, 1, 1]),
            data(&[1]),
            true,
            Some(sink),
        );
        job.execute();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("Fold 2 - start"));
        assert!(seen[1].starts_with("Fold 2 - end"));
        assert!(seen.iter().all(|m| m.contains("ZeroR")));
    }

    #[test]
    fn test_released_inputs_error_names_no_fold() {
        let mut job: EvaluationJob<ZeroR, Evaluation> =
            EvaluationJob::new(4, ZeroR::default(), data(&[0, 1]), data(&[1]), false, None);
        job.clean_up();
        let err = job.run_fold().unwrap_err();
        assert!(matches!(err, CvError::Runner(_)));
        assert_eq!(err.failed_fold(), None);
        assert!(!err.to_string().contains("fold 4"));
    }

    #[test]
    fn test_clean_up_releases_everything() {
        let mut job: EvaluationJob<ZeroR, Evaluation> =
            EvaluationJob::new(0, ZeroR::default(), data(&[0, 1]), data(&[1]), false, None);
        job.execute();
        job.clean_up();
        assert!(job.statistics().is_none());
        assert!(job.model().is_none());
    }
}
