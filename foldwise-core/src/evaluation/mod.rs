//! Evaluation statistics and prediction reports.

pub mod output;
pub mod statistics;

pub use output::{PredictionFormat, PredictionPrinter};
pub use statistics::{
    ClassSummary, Evaluation, EvaluationSummary, PredictionRecord, Statistics,
};
