//! Job runners: execute a list of blocking jobs on a bounded worker pool.

use crate::error::CvError;
use async_trait::async_trait;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A single-use unit of blocking work.
///
/// Jobs capture their own failures: `execute` never returns an error, the
/// outcome is queried afterwards.
pub trait Job: Send + 'static {
    fn label(&self) -> String;

    /// Run the job to completion on the current thread.
    fn execute(&mut self);

    /// Mark the job as failed without (or instead of) running it.
    fn record_failure(&mut self, message: String);

    fn execution_error(&self) -> Option<&str>;

    fn has_execution_error(&self) -> bool {
        self.execution_error().is_some()
    }

    /// Release whatever the job still holds once its result was consumed.
    fn clean_up(&mut self);
}

/// Executes submitted jobs and hands them back in submission order.
#[async_trait]
pub trait JobRunner<J: Job>: Send {
    fn add(&mut self, jobs: Vec<J>);

    /// Begin executing the submitted jobs without waiting for them.
    fn start(&mut self) -> Result<(), CvError>;

    /// Wait until every started job has finished.
    async fn join(&mut self) -> Result<(), CvError>;

    /// Cancel jobs that have not started. With `wait_for_running`, jobs
    /// already executing are waited for; otherwise they are abandoned.
    async fn terminate(&mut self, wait_for_running: bool);

    /// Jobs after `join`/`terminate`, in submission order. `None` marks a
    /// job the runner lost.
    fn completed_jobs(&mut self) -> Vec<Option<J>>;
}

/// Creates runners for a given worker count.
pub trait JobRunnerSetup<J: Job>: Send + Sync {
    fn new_runner(&self, num_threads: usize) -> Box<dyn JobRunner<J>>;
}

/// Runs jobs on the tokio blocking pool, at most `num_threads` at a time.
pub struct LocalJobRunner<J: Job> {
    num_threads: usize,
    queued: Vec<J>,
    handles: Vec<JoinHandle<Option<J>>>,
    completed: Vec<Option<J>>,
    token: CancellationToken,
    started: bool,
}

impl<J: Job> LocalJobRunner<J> {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
            queued: Vec::new(),
            handles: Vec::new(),
            completed: Vec::new(),
            token: CancellationToken::new(),
            started: false,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

#[async_trait]
impl<J: Job> JobRunner<J> for LocalJobRunner<J> {
    fn add(&mut self, jobs: Vec<J>) {
        self.queued.extend(jobs);
    }

    fn start(&mut self) -> Result<(), CvError> {
        if self.started {
            return Err(CvError::runner("runner has already been started"));
        }
        self.started = true;
        debug!(
            jobs = self.queued.len(),
            threads = self.num_threads,
            "Starting local job runner"
        );

        let semaphore = Arc::new(Semaphore::new(self.num_threads));
        for job in self.queued.drain(..) {
            let semaphore = semaphore.clone();
            let token = self.token.clone();
            self.handles
                .push(tokio::spawn(run_when_permitted(job, semaphore, token)));
        }
        Ok(())
    }

    async fn join(&mut self) -> Result<(), CvError> {
        if !self.started {
            return Err(CvError::runner("runner has not been started"));
        }
        // index-based so that a cancelled join loses nothing
        while self.completed.len() < self.handles.len() {
            let idx = self.completed.len();
            let outcome = match (&mut self.handles[idx]).await {
                Ok(job) => job,
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!(position = idx, error = %e, "Job task failed");
                    }
                    None
                }
            };
            self.completed.push(outcome);
        }
        Ok(())
    }

    async fn terminate(&mut self, wait_for_running: bool) {
        info!(wait_for_running, "Terminating job runner");
        self.token.cancel();
        if !wait_for_running {
            for handle in &self.handles[self.completed.len()..] {
                handle.abort();
            }
        }
        let _ = self.join().await;
    }

    fn completed_jobs(&mut self) -> Vec<Option<J>> {
        self.handles.clear();
        std::mem::take(&mut self.completed)
    }
}

impl<J: Job> Drop for LocalJobRunner<J> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// [`JobRunnerSetup`] for [`LocalJobRunner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalJobRunnerSetup;

impl<J: Job> JobRunnerSetup<J> for LocalJobRunnerSetup {
    fn new_runner(&self, num_threads: usize) -> Box<dyn JobRunner<J>> {
        Box::new(LocalJobRunner::new(num_threads))
    }
}

async fn run_when_permitted<J: Job>(
    mut job: J,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
) -> Option<J> {
    let permit = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        permit = semaphore.acquire_owned() => permit.ok(),
    };
    let Some(permit) = permit else {
        job.record_failure("terminated before execution".to_string());
        return Some(job);
    };

    let label = job.label();
    let result = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        execute_guarded(&mut job);
        job
    })
    .await;

    match result {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(job = %label, error = %e, "Blocking job did not complete");
            None
        }
    }
}

/// Run a job, turning a panic into a recorded failure.
fn execute_guarded<J: Job>(job: &mut J) {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| job.execute())) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(job = %job.label(), %message, "Job panicked");
        job.record_failure(format!("job panicked: {message}"));
    }
}
