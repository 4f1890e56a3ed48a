//! Cross-validation orchestrator: splits the data, evaluates every fold on
//! the sequential or the parallel path, and merges the results in fold
//! order.

use crate::config::CrossValidationConfig;
use crate::data::Dataset;
use crate::error::CvError;
use crate::evaluation::{Evaluation, PredictionFormat, PredictionPrinter, Statistics};
use crate::execution::job::EvaluationJob;
use crate::execution::progress::StatusSink;
use crate::execution::report::CrossValidationReport;
use crate::execution::runner::{Job, JobRunner, JobRunnerSetup, LocalJobRunner};
use crate::execution::stop::StopHandle;
use crate::execution::threads::{HostThreadResolver, ThreadCountResolver};
use crate::folds::{FoldGenerator, FoldSplit, Folds, OriginalIndexMap, StratifiedFoldGenerator};
use crate::models::Classifier;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs k-fold cross-validation of one model on one dataset.
///
/// Configure with the setters, then call [`execute`](Self::execute). The
/// execution may be stopped at any time through [`stop_execution`] or a
/// [`StopHandle`] obtained before the run.
///
/// [`stop_execution`]: Self::stop_execution
pub struct CrossValidationExecution<M: Classifier, S: Statistics = Evaluation> {
    model: Option<M>,
    data: Option<Arc<Dataset>>,
    folds: Folds,
    seed: u64,
    separate_folds: bool,
    discard_predictions: bool,
    num_threads: i32,
    wait_for_jobs: bool,
    prediction_format: Option<PredictionFormat>,
    generator: Arc<dyn FoldGenerator>,
    thread_resolver: Arc<dyn ThreadCountResolver>,
    runner_setup: Option<Arc<dyn JobRunnerSetup<EvaluationJob<M, S>>>>,
    status: Option<Arc<dyn StatusSink>>,
    stop: StopHandle,
}

impl<M: Classifier, S: Statistics> Default for CrossValidationExecution<M, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Classifier, S: Statistics> CrossValidationExecution<M, S> {
    pub fn new() -> Self {
        Self::from_config(&CrossValidationConfig::default())
    }

    /// Execution configured from `config`. The model tag is not resolved
    /// here; set the model separately.
    pub fn from_config(config: &CrossValidationConfig) -> Self {
        Self {
            model: None,
            data: None,
            folds: config.folds,
            seed: config.seed,
            separate_folds: config.separate_folds,
            discard_predictions: config.discard_predictions,
            num_threads: config.num_threads,
            wait_for_jobs: config.wait_for_jobs,
            prediction_format: config.prediction_output,
            generator: Arc::new(StratifiedFoldGenerator::new(config.stratify)),
            thread_resolver: Arc::new(HostThreadResolver),
            runner_setup: None,
            status: None,
            stop: StopHandle::new(),
        }
    }

    pub fn set_model(&mut self, model: M) {
        self.model = Some(model);
    }

    pub fn set_data(&mut self, data: impl Into<Arc<Dataset>>) {
        self.data = Some(data.into());
    }

    /// Set the fold count; `-1` selects leave-one-out, anything else below
    /// 2 is rejected and leaves the previous value in place.
    pub fn set_folds(&mut self, folds: i64) -> Result<(), CvError> {
        self.folds = Folds::try_from(folds)?;
        Ok(())
    }

    pub fn set_fold_count(&mut self, folds: Folds) {
        self.folds = folds;
    }

    pub fn folds(&self) -> Folds {
        self.folds
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn set_separate_folds(&mut self, separate: bool) {
        self.separate_folds = separate;
    }

    pub fn set_discard_predictions(&mut self, discard: bool) {
        self.discard_predictions = discard;
    }

    pub fn set_num_threads(&mut self, num_threads: i32) {
        self.num_threads = num_threads;
    }

    pub fn num_threads(&self) -> i32 {
        self.num_threads
    }

    pub fn set_wait_for_jobs(&mut self, wait: bool) {
        self.wait_for_jobs = wait;
    }

    pub fn set_prediction_output(&mut self, format: Option<PredictionFormat>) {
        self.prediction_format = format;
    }

    pub fn set_fold_generator(&mut self, generator: impl FoldGenerator + 'static) {
        self.generator = Arc::new(generator);
    }

    pub fn set_thread_resolver(&mut self, resolver: impl ThreadCountResolver + 'static) {
        self.thread_resolver = Arc::new(resolver);
    }

    /// Replace the runner used on the parallel path.
    pub fn set_job_runner_setup(&mut self, setup: Arc<dyn JobRunnerSetup<EvaluationJob<M, S>>>) {
        self.runner_setup = Some(setup);
    }

    pub fn set_status_sink(&mut self, sink: Arc<dyn StatusSink>) {
        self.status = Some(sink);
    }

    /// Share `handle` so that stopping it stops this execution.
    pub fn set_stop_handle(&mut self, handle: StopHandle) {
        self.stop = handle;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request the run to stop. Safe to call from any thread, any number of
    /// times.
    pub fn stop_execution(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Run the cross-validation.
    ///
    /// `Err` means the run could not begin (missing model or data, invalid
    /// folds). Once folds are being evaluated, failures are reported in
    /// [`CrossValidationReport::failure`] next to the partial aggregate.
    pub async fn execute(&self) -> Result<CrossValidationReport<M, S>, CvError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = Uuid::new_v4();

        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CvError::config("no model to evaluate"))?;
        let data = self
            .data
            .clone()
            .ok_or_else(|| CvError::config("no dataset to evaluate on"))?;

        let splits = self.generator.generate(&data, self.folds, self.seed)?;
        if splits.iter().enumerate().any(|(i, split)| split.fold != i) {
            return Err(CvError::invalid_folds("folds must be returned in index order"));
        }
        let num_folds = splits.len();
        let original_indices = if self.discard_predictions {
            None
        } else {
            Some(OriginalIndexMap::from_splits(&splits, data.num_rows())?)
        };

        let actual_num_threads = self
            .thread_resolver
            .resolve(self.num_threads)
            .min(num_folds)
            .max(1);
        let single_threaded = actual_num_threads == 1 && !self.separate_folds;

        info!(
            %run_id,
            relation = data.relation(),
            model = %model.description(),
            folds = num_folds,
            threads = actual_num_threads,
            single_threaded,
            discard_predictions = self.discard_predictions,
            "Starting cross-validation"
        );

        let mut report = CrossValidationReport {
            run_id,
            started_at,
            duration_ms: 0,
            folds: num_folds,
            actual_num_threads,
            single_threaded,
            aggregate: None,
            fold_statistics: None,
            fold_models: None,
            original_indices,
            prediction_output: None,
            stopped: false,
            failure: None,
        };

        if single_threaded {
            let pass = SequentialPass {
                model: model.clone(),
                data: Arc::clone(&data),
                discard_predictions: self.discard_predictions,
                prediction_format: self.prediction_format,
                status: self.status.clone(),
                stop: self.stop.clone(),
            };
            match tokio::task::spawn_blocking(move || pass.run::<S>(splits)).await {
                Ok(outcome) => {
                    report.aggregate = Some(outcome.aggregate);
                    report.prediction_output = outcome.prediction_output;
                    report.failure = outcome.failure;
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    report.failure = Some(CvError::runner(format!(
                        "sequential fold loop did not complete: {e}"
                    )));
                }
            }
        } else {
            if self.prediction_format.is_some() {
                warn!(%run_id, "Prediction output is only rendered on the sequential path, ignoring");
            }
            self.run_parallel(model, &data, splits, actual_num_threads, &mut report)
                .await;
        }

        report.stopped = self.is_stopped();
        report.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &report.failure {
            Some(e) => warn!(%run_id, error = %e, "Cross-validation failed"),
            None if report.stopped => info!(%run_id, "Cross-validation stopped"),
            None => info!(
                %run_id,
                duration_ms = report.duration_ms,
                "Cross-validation finished"
            ),
        }
        Ok(report)
    }

    /// Evaluate folds as independent jobs and merge them in fold order.
    async fn run_parallel(
        &self,
        model: &M,
        data: &Dataset,
        splits: Vec<FoldSplit>,
        num_threads: usize,
        report: &mut CrossValidationReport<M, S>,
    ) {
        let num_folds = splits.len();
        let mut jobs = Vec::with_capacity(num_folds);
        for split in splits {
            let subsets = data
                .subset(&split.train)
                .and_then(|train| Ok((train, data.subset(&split.test)?)));
            match subsets {
                Ok((train, test)) => jobs.push(EvaluationJob::new(
                    split.fold,
                    model.clone(),
                    train,
                    test,
                    self.discard_predictions,
                    self.status.clone(),
                )),
                Err(e) => {
                    report.failure = Some(CvError::fold_failed(split.fold, e.to_string()));
                    return;
                }
            }
        }

        let mut runner: Box<dyn JobRunner<EvaluationJob<M, S>>> = match &self.runner_setup {
            Some(setup) => setup.new_runner(num_threads),
            None => Box::new(LocalJobRunner::new(num_threads)),
        };
        runner.add(jobs);
        if let Err(e) = runner.start() {
            report.failure = Some(e);
            return;
        }

        let stopped = tokio::select! {
            joined = runner.join() => {
                if let Err(e) = joined {
                    report.failure = Some(e);
                    return;
                }
                false
            }
            _ = self.stop.stopped() => true,
        };
        if stopped || self.is_stopped() {
            runner.terminate(self.wait_for_jobs).await;
            debug!(wait_for_jobs = self.wait_for_jobs, "Job runner terminated, skipping aggregation");
            return;
        }

        let mut aggregate = S::primed(data, self.discard_predictions);
        let mut fold_statistics = Vec::with_capacity(num_folds);
        let mut fold_models = Vec::with_capacity(num_folds);
        for (position, slot) in runner.completed_jobs().into_iter().enumerate() {
            let Some(mut job) = slot else {
                report.failure = Some(CvError::fold_failed(
                    position,
                    "job was not executed by the job runner",
                ));
                break;
            };
            let fold = job.fold();
            let Some(statistics) = job.take_statistics() else {
                let detail = job
                    .execution_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| "fold produced no statistics".to_string());
                report.failure = Some(CvError::fold_failed(fold, detail));
                break;
            };
            if let Err(e) = aggregate.combine(&statistics) {
                report.failure = Some(e);
                break;
            }
            fold_statistics.push(statistics);
            if let Some(trained) = job.take_model() {
                fold_models.push(trained);
            }
            job.clean_up();
            debug!(fold, "Fold aggregated");
        }
        if report.failure.is_none() && fold_statistics.len() < num_folds {
            report.failure = Some(CvError::fold_failed(
                fold_statistics.len(),
                "job was not returned by the job runner",
            ));
        }

        report.aggregate = Some(aggregate);
        report.fold_statistics = Some(fold_statistics);
        report.fold_models = Some(fold_models);
    }
}

/// Owned inputs of the sequential fold loop, which runs on the blocking pool.
struct SequentialPass<M> {
    model: M,
    data: Arc<Dataset>,
    discard_predictions: bool,
    prediction_format: Option<PredictionFormat>,
    status: Option<Arc<dyn StatusSink>>,
    stop: StopHandle,
}

struct SequentialOutcome<S> {
    aggregate: S,
    prediction_output: Option<String>,
    failure: Option<CvError>,
}

impl<M: Classifier> SequentialPass<M> {
    /// Evaluate folds one after another. A fold reaches the aggregate and
    /// the prediction output only once it has been evaluated completely.
    fn run<S: Statistics>(self, splits: Vec<FoldSplit>) -> SequentialOutcome<S> {
        let data = &*self.data;
        let mut printer = self.prediction_format.map(|format| {
            let mut printer = PredictionPrinter::new(format, data);
            printer.print_header();
            printer
        });
        let mut aggregate = S::primed(data, self.discard_predictions);
        let mut failure = None;
        let total = splits.len();

        for split in &splits {
            if self.stop.is_stopped() {
                debug!(fold = split.fold, "Stop requested, leaving fold loop");
                break;
            }
            if let Some(sink) = &self.status {
                sink.show_status(&format!(
                    "Fold {}/{}: '{}' using {}",
                    split.fold,
                    total,
                    data.relation(),
                    self.model.description()
                ));
            }
            let mut fold_printer = printer.as_ref().map(PredictionPrinter::fork);
            let evaluated = self
                .evaluate_fold::<S>(split, fold_printer.as_mut())
                .and_then(|statistics| aggregate.combine(&statistics));
            if let Err(e) = evaluated {
                warn!(fold = split.fold, error = %e, "Fold failed");
                failure = Some(CvError::fold_failed(split.fold, e.to_string()));
                break;
            }
            if let (Some(printer), Some(fold_printer)) = (printer.as_mut(), fold_printer) {
                printer.absorb(fold_printer);
            }
            debug!(fold = split.fold, "Fold evaluated");
        }

        if let Some(printer) = printer.as_mut() {
            printer.print_footer();
        }
        SequentialOutcome {
            aggregate,
            prediction_output: printer.map(PredictionPrinter::into_buffer),
            failure,
        }
    }

    fn evaluate_fold<S: Statistics>(
        &self,
        split: &FoldSplit,
        printer: Option<&mut PredictionPrinter>,
    ) -> Result<S, CvError> {
        let train = self.data.subset(&split.train)?;
        let test = self.data.subset(&split.test)?;
        let mut fold_model = self.model.clone();
        fold_model.train(&train)?;
        let mut statistics = S::primed(&train, self.discard_predictions);
        statistics.evaluate_model(&fold_model, &test, printer)?;
        Ok(statistics)
    }
}
