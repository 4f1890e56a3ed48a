//! Error types for the foldwise-core crate.

use thiserror::Error;

/// Top-level error type for cross-validation operations.
#[derive(Debug, Error)]
pub enum CvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid folds: {0}")]
    InvalidFolds(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Model error: {0}")]
    Model(String),

    /// A single fold could not be trained or evaluated.
    #[error("fold {fold} failed: {detail}")]
    FoldFailed { fold: usize, detail: String },

    #[error("Job runner error: {0}")]
    Runner(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CvError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_folds(msg: impl Into<String>) -> Self {
        Self::InvalidFolds(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn fold_failed(fold: usize, detail: impl Into<String>) -> Self {
        Self::FoldFailed {
            fold,
            detail: detail.into(),
        }
    }

    pub fn runner(msg: impl Into<String>) -> Self {
        Self::Runner(msg.into())
    }

    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::Aggregation(msg.into())
    }

    /// Whether this error was raised before any fold ran.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidFolds(_) | Self::Dataset(_)
        )
    }

    /// The fold index named by a per-fold failure.
    pub fn failed_fold(&self) -> Option<usize> {
        match self {
            Self::FoldFailed { fold, .. } => Some(*fold),
            _ => None,
        }
    }
}
