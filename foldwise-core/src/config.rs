//! Configuration types and layered loading.

use crate::error::CvError;
use crate::evaluation::PredictionFormat;
use crate::folds::Folds;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoldwiseConfig {
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Settings of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    /// Number of folds, or `-1` for leave-one-out.
    pub folds: Folds,
    pub seed: u64,
    /// Always evaluate folds as separate jobs, even with one thread.
    pub separate_folds: bool,
    /// Keep only summary statistics, not individual predictions.
    pub discard_predictions: bool,
    /// `0`/`1` sequential, `n > 1` up to `n` workers, negative all cores.
    pub num_threads: i32,
    /// On stop, let folds that already started finish.
    pub wait_for_jobs: bool,
    pub stratify: bool,
    /// Repetitions, each with the next seed.
    pub runs: usize,
    /// Render predictions in this format (sequential runs only).
    pub prediction_output: Option<PredictionFormat>,
    /// Registry tag of the model to evaluate.
    pub model: String,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            folds: Folds::default(),
            seed: 1,
            separate_folds: false,
            discard_predictions: false,
            num_threads: 1,
            wait_for_jobs: true,
            stratify: true,
            runs: 1,
            prediction_output: None,
            model: "naive_bayes".to_string(),
        }
    }
}

impl CrossValidationConfig {
    /// Assign the fold count, rejecting anything but `k >= 2` or `-1`.
    pub fn set_folds(&mut self, folds: i64) -> Result<(), CvError> {
        self.folds = Folds::try_from(folds)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CvError> {
        if self.runs == 0 {
            return Err(CvError::config("runs must be at least 1"));
        }
        if self.model.trim().is_empty() {
            return Err(CvError::config("model tag must not be empty"));
        }
        Ok(())
    }
}

/// How datasets are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub delimiter: char,
    /// Header name of the class column; the last column when unset.
    pub class_column: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            class_column: None,
        }
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "foldwise", "foldwise")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`FOLDWISE_CROSS_VALIDATION__FOLDS`, ...)
/// 2. The explicit config file, if given
/// 3. User config (`~/.config/foldwise/config.toml`)
/// 4. Built-in defaults
pub fn load_config(file: Option<&Path>) -> Result<FoldwiseConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FoldwiseConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(file) = file {
        figment = figment.merge(Toml::file(file));
    }

    figment = figment.merge(Env::prefixed("FOLDWISE_").split("__"));

    figment.extract().map_err(Box::new)
}

/// [`load_config`] followed by validation.
pub fn load_validated(file: Option<&Path>) -> Result<FoldwiseConfig, CvError> {
    let config = load_config(file).map_err(|e| CvError::config(e.to_string()))?;
    config.cross_validation.validate()?;
    Ok(config)
}
