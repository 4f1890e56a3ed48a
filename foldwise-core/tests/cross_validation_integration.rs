//! End-to-end cross-validation runs over small synthetic datasets.

use async_trait::async_trait;
use foldwise_core::data::{Dataset, Row};
use foldwise_core::error::CvError;
use foldwise_core::evaluation::{Evaluation, PredictionFormat, Statistics};
use foldwise_core::execution::{
    CrossValidationExecution, EvaluationJob, JobRunner, JobRunnerSetup, LocalJobRunner,
    StatusSink,
};
use foldwise_core::folds::{FoldGenerator, FoldSplit, Folds};
use foldwise_core::models::{Classifier, GaussianNaiveBayes, ZeroR};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// --- Fixtures ---

/// `n` rows, attribute 0 is the row index, classes alternate.
fn dataset(n: usize) -> Dataset {
    Dataset::new(
        "synthetic",
        vec!["index".into(), "signal".into()],
        vec!["neg".into(), "pos".into()],
        (0..n)
            .map(|i| {
                let class = i % 2;
                let signal = class as f64 * 4.0 + (i % 5) as f64 * 0.3;
                Row::new(vec![i as f64, signal], class)
            })
            .collect(),
    )
    .unwrap()
}

/// Fold `i` tests a contiguous block of rows.
struct ContiguousFolds;

impl FoldGenerator for ContiguousFolds {
    fn generate(&self, data: &Dataset, folds: Folds, _seed: u64) -> Result<Vec<FoldSplit>, CvError> {
        let n = data.num_rows();
        let k = folds.actual(n)?;
        Ok((0..k)
            .map(|fold| {
                let test: Vec<usize> = (fold * n / k..(fold + 1) * n / k).collect();
                let train = (0..n).filter(|row| !test.contains(row)).collect();
                FoldSplit { fold, train, test }
            })
            .collect())
    }
}

/// Fails to train unless the row with index `required` is in the training set.
#[derive(Clone)]
struct RequiresRow {
    required: f64,
    panic: bool,
    inner: ZeroR,
}

impl RequiresRow {
    fn new(required: usize) -> Self {
        Self {
            required: required as f64,
            panic: false,
            inner: ZeroR::new(),
        }
    }
}

impl Classifier for RequiresRow {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        if !data.rows().iter().any(|r| r.values[0] == self.required) {
            if self.panic {
                panic!("row {} missing", self.required);
            }
            return Err(CvError::model(format!("row {} missing", self.required)));
        }
        self.inner.train(data)
    }

    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError> {
        self.inner.distribution(row)
    }

    fn description(&self) -> String {
        "RequiresRow".to_string()
    }
}

/// ZeroR that takes a while to train.
#[derive(Clone)]
struct Slow {
    delay: Duration,
    inner: ZeroR,
}

impl Classifier for Slow {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        std::thread::sleep(self.delay);
        self.inner.train(data)
    }

    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError> {
        self.inner.distribution(row)
    }

    fn description(&self) -> String {
        "Slow".to_string()
    }
}

/// ZeroR whose prediction fails for the row with index `bad`.
#[derive(Clone)]
struct FailsOnRow {
    bad: f64,
    inner: ZeroR,
}

impl Classifier for FailsOnRow {
    fn train(&mut self, data: &Dataset) -> Result<(), CvError> {
        self.inner.train(data)
    }

    fn distribution(&self, row: &Row) -> Result<Vec<f64>, CvError> {
        if row.values[0] == self.bad {
            return Err(CvError::model("bad row"));
        }
        self.inner.distribution(row)
    }

    fn description(&self) -> String {
        "FailsOnRow".to_string()
    }
}

fn execution<M: Classifier>(model: M, rows: usize, folds: i64) -> CrossValidationExecution<M> {
    let mut cv = CrossValidationExecution::new();
    cv.set_model(model);
    cv.set_data(dataset(rows));
    cv.set_folds(folds).unwrap();
    cv
}

fn recording_sink() -> (Arc<dyn StatusSink>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink: Arc<dyn StatusSink> = {
        let seen = seen.clone();
        Arc::new(move |msg: &str| seen.lock().unwrap().push(msg.to_string()))
    };
    (sink, seen)
}

// --- Sequential path ---

#[tokio::test]
async fn sequential_ten_rows_five_folds() {
    let mut cv = execution(GaussianNaiveBayes::new(), 10, 5);
    cv.set_num_threads(1);
    let report = cv.execute().await.unwrap();

    assert!(report.is_success());
    assert!(report.single_threaded);
    assert_eq!(report.folds, 5);
    let aggregate = report.aggregate().unwrap();
    assert_eq!(aggregate.num_evaluated(), 10);
    assert_eq!(aggregate.predictions().unwrap().len(), 10);

    let map = report.original_indices.as_ref().unwrap();
    let mut order = map.order.clone();
    order.sort_unstable();
    assert_eq!(order, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn sequential_failure_keeps_partial_aggregate() {
    let mut cv = execution(RequiresRow::new(4), 10, 5);
    cv.set_fold_generator(ContiguousFolds);
    let report = cv.execute().await.unwrap();

    let failure = report.failure().unwrap();
    assert_eq!(failure.failed_fold(), Some(2));
    assert!(failure.to_string().contains("row 4 missing"));
    // folds 0 and 1, two test rows each
    assert_eq!(report.aggregate().unwrap().num_evaluated(), 4);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn sequential_stop_keeps_folds_already_evaluated() {
    let mut cv = execution(ZeroR::new(), 10, 5);
    let handle = cv.stop_handle();
    let (sink, seen) = recording_sink();
    cv.set_status_sink(Arc::new(move |msg: &str| {
        sink.show_status(msg);
        handle.stop();
    }));
    let report = cv.execute().await.unwrap();

    assert!(report.stopped);
    assert!(report.failure.is_none());
    assert_eq!(report.aggregate().unwrap().num_evaluated(), 2);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(seen.lock().unwrap()[0].starts_with("Fold 0/5: 'synthetic' using ZeroR"));
}

#[tokio::test]
async fn sequential_stop_from_concurrent_task() {
    let model = Slow {
        delay: Duration::from_millis(100),
        inner: ZeroR::new(),
    };
    let mut cv = execution(model, 20, 10);
    cv.set_num_threads(1);
    let handle = cv.stop_handle();

    let clock = Instant::now();
    let (report, _) = tokio::join!(cv.execute(), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop();
    });
    let report = report.unwrap();

    assert!(report.single_threaded);
    assert!(report.stopped);
    assert!(report.failure.is_none());
    let evaluated = report.aggregate().unwrap().num_evaluated();
    assert!(evaluated < 20);
    assert_eq!(evaluated % 2, 0);
    assert!(report.duration_ms >= 100);
    assert!(clock.elapsed() < Duration::from_millis(800));
}

#[tokio::test]
async fn fold_failing_midway_leaves_no_rows_in_aggregate() {
    for threads in [1, 4] {
        let model = FailsOnRow {
            bad: 5.0,
            inner: ZeroR::new(),
        };
        let mut cv = execution(model, 10, 5);
        cv.set_fold_generator(ContiguousFolds);
        cv.set_num_threads(threads);
        cv.set_prediction_output(Some(PredictionFormat::Csv));
        let report = cv.execute().await.unwrap();

        let failure = report.failure().unwrap();
        assert_eq!(failure.failed_fold(), Some(2));
        assert!(failure.to_string().contains("bad row"));
        let aggregate = report.aggregate().unwrap();
        assert_eq!(aggregate.num_evaluated(), 4);
        assert_eq!(aggregate.predictions().unwrap().len(), 4);
        if threads == 1 {
            // header plus the rows of folds 0 and 1
            assert_eq!(report.prediction_output.unwrap().lines().count(), 5);
        }
    }
}

#[tokio::test]
async fn leave_one_out_uses_one_fold_per_row() {
    let mut cv = execution(ZeroR::new(), 8, -1);
    cv.set_num_threads(3);
    let report = cv.execute().await.unwrap();
    assert_eq!(report.folds, 8);
    assert_eq!(report.aggregate().unwrap().num_evaluated(), 8);
    assert_eq!(report.fold_statistics.unwrap().len(), 8);
}

// --- Parallel path ---

#[tokio::test]
async fn parallel_failure_on_fold_two() {
    let mut cv = execution(RequiresRow::new(4), 10, 5);
    cv.set_fold_generator(ContiguousFolds);
    cv.set_num_threads(4);
    let report = cv.execute().await.unwrap();

    assert!(!report.single_threaded);
    assert!(matches!(
        report.failure(),
        Some(CvError::FoldFailed { fold: 2, .. })
    ));
    assert_eq!(report.aggregate().unwrap().num_evaluated(), 4);
    assert_eq!(report.fold_statistics.as_ref().unwrap().len(), 2);
    assert_eq!(report.fold_models.as_ref().unwrap().len(), 2);
}

#[tokio::test]
async fn parallel_panic_is_reported_as_fold_failure() {
    let mut model = RequiresRow::new(0);
    model.panic = true;
    let mut cv = execution(model, 10, 5);
    cv.set_fold_generator(ContiguousFolds);
    cv.set_num_threads(2);
    let report = cv.execute().await.unwrap();

    let failure = report.failure().unwrap();
    assert_eq!(failure.failed_fold(), Some(0));
    assert!(failure.to_string().contains("panicked"));
    assert_eq!(report.aggregate().unwrap().num_evaluated(), 0);
}

#[tokio::test]
async fn discard_predictions_with_one_hundred_folds() {
    let mut cv = execution(ZeroR::new(), 100, 100);
    cv.set_discard_predictions(true);
    cv.set_num_threads(4);
    let report = cv.execute().await.unwrap();

    assert!(report.is_success());
    assert!(report.original_indices.is_none());
    let aggregate = report.aggregate().unwrap();
    assert_eq!(aggregate.num_evaluated(), 100);
    assert!(aggregate.predictions().is_none());
}

#[tokio::test]
async fn thread_count_does_not_change_results() {
    let mut sequential = execution(GaussianNaiveBayes::new(), 40, 5);
    sequential.set_seed(42);
    sequential.set_num_threads(1);
    let mut parallel = execution(GaussianNaiveBayes::new(), 40, 5);
    parallel.set_seed(42);
    parallel.set_num_threads(4);

    let a = sequential.execute().await.unwrap().into_result().unwrap();
    let b = parallel.execute().await.unwrap().into_result().unwrap();

    assert_eq!(a.aggregate().unwrap(), b.aggregate().unwrap());
}

#[tokio::test]
async fn same_seed_same_result() {
    let run = || async {
        let mut cv = execution(GaussianNaiveBayes::new(), 30, 3);
        cv.set_seed(9);
        cv.set_num_threads(3);
        cv.execute().await.unwrap()
    };
    let (first, second) = (run().await, run().await);
    assert_eq!(first.original_indices, second.original_indices);
    assert_eq!(first.aggregate(), second.aggregate());
}

#[tokio::test]
async fn predictions_align_with_original_indices() {
    for threads in [1, 4] {
        let data = dataset(23);
        let mut cv = CrossValidationExecution::<GaussianNaiveBayes>::new();
        cv.set_model(GaussianNaiveBayes::new());
        cv.set_data(data.clone());
        cv.set_folds(4).unwrap();
        cv.set_num_threads(threads);
        let report = cv.execute().await.unwrap();

        let map = report.original_indices.as_ref().unwrap();
        let predictions = report.aggregate().unwrap().predictions().unwrap();
        assert_eq!(predictions.len(), 23);
        for (position, prediction) in predictions.iter().enumerate() {
            let row = map.original_index(position).unwrap();
            assert_eq!(prediction.actual, data.rows()[row].class);
        }
    }
}

#[tokio::test]
async fn parallel_status_messages_per_fold() {
    let mut cv = execution(ZeroR::new(), 12, 4);
    cv.set_num_threads(2);
    let (sink, seen) = recording_sink();
    cv.set_status_sink(sink);
    cv.execute().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 8);
    for fold in 0..4 {
        assert!(seen.iter().any(|m| m.starts_with(&format!("Fold {fold} - start"))));
        assert!(seen.iter().any(|m| m.starts_with(&format!("Fold {fold} - end"))));
    }
}

#[tokio::test]
async fn parallel_stop_returns_without_aggregate() {
    let model = Slow {
        delay: Duration::from_millis(100),
        inner: ZeroR::new(),
    };
    let mut cv = execution(model, 20, 10);
    cv.set_num_threads(2);
    let handle = cv.stop_handle();

    let (report, _) = tokio::join!(cv.execute(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        handle.stop();
    });
    let report = report.unwrap();

    assert!(report.stopped);
    assert!(report.failure.is_none());
    assert!(report.aggregate.is_none());
    assert!(!report.is_success());
}

#[tokio::test]
async fn parallel_stop_without_waiting_abandons_running_folds() {
    let model = Slow {
        delay: Duration::from_millis(400),
        inner: ZeroR::new(),
    };
    let mut cv = execution(model, 8, 4);
    cv.set_num_threads(2);
    cv.set_wait_for_jobs(false);
    let handle = cv.stop_handle();

    let clock = Instant::now();
    let (report, _) = tokio::join!(cv.execute(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });
    let report = report.unwrap();

    assert!(clock.elapsed() < Duration::from_millis(300));
    assert!(report.stopped);
    assert!(report.failure.is_none());
    assert!(report.aggregate.is_none());
}

// --- Custom runners ---

type ZeroRJob = EvaluationJob<ZeroR, Evaluation>;

/// Local runner that loses the job at position `lose`.
struct LosingRunner {
    inner: LocalJobRunner<ZeroRJob>,
    lose: usize,
}

#[async_trait]
impl JobRunner<ZeroRJob> for LosingRunner {
    fn add(&mut self, jobs: Vec<ZeroRJob>) {
        self.inner.add(jobs);
    }

    fn start(&mut self) -> Result<(), CvError> {
        self.inner.start()
    }

    async fn join(&mut self) -> Result<(), CvError> {
        self.inner.join().await
    }

    async fn terminate(&mut self, wait_for_running: bool) {
        self.inner.terminate(wait_for_running).await;
    }

    fn completed_jobs(&mut self) -> Vec<Option<ZeroRJob>> {
        let mut jobs = self.inner.completed_jobs();
        if let Some(slot) = jobs.get_mut(self.lose) {
            *slot = None;
        }
        jobs
    }
}

struct LosingSetup {
    lose: usize,
}

impl JobRunnerSetup<ZeroRJob> for LosingSetup {
    fn new_runner(&self, num_threads: usize) -> Box<dyn JobRunner<ZeroRJob>> {
        Box::new(LosingRunner {
            inner: LocalJobRunner::new(num_threads),
            lose: self.lose,
        })
    }
}

#[tokio::test]
async fn runner_losing_a_job_fails_that_fold() {
    let mut cv = execution(ZeroR::new(), 10, 5);
    cv.set_num_threads(2);
    cv.set_job_runner_setup(Arc::new(LosingSetup { lose: 3 }));
    let report = cv.execute().await.unwrap();

    let failure = report.failure().unwrap();
    assert_eq!(failure.failed_fold(), Some(3));
    assert!(failure.to_string().contains("not executed"));
    assert_eq!(report.fold_statistics.as_ref().unwrap().len(), 3);
}

#[tokio::test]
async fn separate_folds_with_one_thread_uses_runner() {
    let mut cv = execution(ZeroR::new(), 10, 5);
    cv.set_num_threads(1);
    cv.set_separate_folds(true);
    cv.set_job_runner_setup(Arc::new(LosingSetup { lose: 0 }));
    let report = cv.execute().await.unwrap();
    assert_eq!(report.actual_num_threads, 1);
    assert_eq!(report.failure().and_then(CvError::failed_fold), Some(0));
}
