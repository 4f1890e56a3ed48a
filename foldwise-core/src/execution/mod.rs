//! Fold execution: jobs, runners and the cross-validation orchestrator.

pub mod cross_validation;
pub mod job;
pub mod progress;
pub mod repeated;
pub mod report;
pub mod runner;
pub mod stop;
pub mod threads;

pub use cross_validation::CrossValidationExecution;
pub use job::EvaluationJob;
pub use progress::{LogStatusSink, StatusSink};
pub use repeated::RepeatedCrossValidation;
pub use report::{CrossValidationReport, RunMetadata};
pub use runner::{Job, JobRunner, JobRunnerSetup, LocalJobRunner, LocalJobRunnerSetup};
pub use stop::StopHandle;
pub use threads::{HostThreadResolver, ThreadCountResolver, determine_num_threads};
