//! # foldwise-core: parallel k-fold cross-validation
//!
//! Splits a labelled dataset into folds, trains an independent clone of a
//! model per fold and merges the per-fold statistics in fold order, either
//! sequentially or on a bounded pool of worker threads.
//!
//! ```no_run
//! # async fn run() -> Result<(), foldwise_core::CvError> {
//! use foldwise_core::{CrossValidationExecution, CsvSource, GaussianNaiveBayes};
//!
//! let data = CsvSource::new("iris.csv").load().await?;
//! let mut cv = CrossValidationExecution::<GaussianNaiveBayes>::new();
//! cv.set_model(GaussianNaiveBayes::default());
//! cv.set_data(data);
//! cv.set_folds(10)?;
//! cv.set_num_threads(-1);
//! let report = cv.execute().await?.into_result()?;
//! if let Some(evaluation) = report.aggregate() {
//!     println!("{}", evaluation.summary());
//! }
//! # Ok(())
//! # }
//! ```

// Foundation
pub mod config;
pub mod error;

// Data and folds
pub mod data;
pub mod folds;

// Models and statistics
pub mod evaluation;
pub mod models;

// Execution
pub mod execution;

// Re-exports
pub use config::{CrossValidationConfig, DataConfig, FoldwiseConfig, load_config};
pub use data::{CsvSource, Dataset, Row};
pub use error::CvError;
pub use evaluation::{Evaluation, EvaluationSummary, PredictionFormat, Statistics};
pub use execution::{
    CrossValidationExecution, CrossValidationReport, RepeatedCrossValidation, StopHandle,
};
pub use folds::{FoldGenerator, Folds, OriginalIndexMap, StratifiedFoldGenerator};
pub use models::{BuiltinModel, Classifier, GaussianNaiveBayes, ModelRegistry, ZeroR};
