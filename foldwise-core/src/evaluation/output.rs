//! Textual per-row prediction reports.
//!
//! A printer appends to a single `String` buffer, so it is only ever handed
//! to the sequential execution path where folds run one after another.

use crate::data::Dataset;
use crate::models::argmax;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Layout of the prediction report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionFormat {
    PlainText,
    Csv,
}

impl std::str::FromStr for PredictionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain_text" | "text" | "plain" => Ok(Self::PlainText),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown prediction format '{other}' (use plain_text or csv)")),
        }
    }
}

/// Writes header, one line per prediction and footer into a buffer.
#[derive(Debug, Clone)]
pub struct PredictionPrinter {
    format: PredictionFormat,
    class_labels: Vec<String>,
    buffer: String,
    count: usize,
}

impl PredictionPrinter {
    pub fn new(format: PredictionFormat, data: &Dataset) -> Self {
        Self {
            format,
            class_labels: data.class_labels().to_vec(),
            buffer: String::new(),
            count: 0,
        }
    }

    pub fn print_header(&mut self) {
        match self.format {
            PredictionFormat::PlainText => {
                self.buffer.push_str("=== Predictions on test data ===\n\n");
                let _ = writeln!(
                    self.buffer,
                    "{:>6} {:>14} {:>14} {:>5} {:>10}",
                    "inst#", "actual", "predicted", "error", "prediction"
                );
            }
            PredictionFormat::Csv => {
                self.buffer.push_str("inst#,actual,predicted,error,prediction\n");
            }
        }
    }

    /// Append one prediction. Instances are numbered from 1 across the
    /// whole run, in the order they are printed.
    pub fn print_prediction(&mut self, actual: usize, distribution: &[f64]) {
        self.count += 1;
        let predicted = argmax(distribution);
        let confidence = distribution.get(predicted).copied().unwrap_or(0.0);
        let actual_label = self.label(actual);
        let predicted_label = self.label(predicted);
        let error = if actual == predicted { "" } else { "+" };
        match self.format {
            PredictionFormat::PlainText => {
                let _ = writeln!(
                    self.buffer,
                    "{:>6} {:>14} {:>14} {:>5} {:>10.3}",
                    self.count, actual_label, predicted_label, error, confidence
                );
            }
            PredictionFormat::Csv => {
                let _ = writeln!(
                    self.buffer,
                    "{},{},{},{},{:.3}",
                    self.count, actual_label, predicted_label, error, confidence
                );
            }
        }
    }

    pub fn print_footer(&mut self) {
        if self.format == PredictionFormat::PlainText {
            self.buffer.push('\n');
        }
    }

    /// Empty printer that continues this one's instance numbering. Lines
    /// written to it reach this printer only through [`absorb`](Self::absorb).
    pub fn fork(&self) -> Self {
        Self {
            format: self.format,
            class_labels: self.class_labels.clone(),
            buffer: String::new(),
            count: self.count,
        }
    }

    /// Append the lines of a printer obtained from [`fork`](Self::fork).
    pub fn absorb(&mut self, fork: PredictionPrinter) {
        self.buffer.push_str(&fork.buffer);
        self.count = fork.count;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn into_buffer(self) -> String {
        self.buffer
    }

    fn label(&self, class: usize) -> String {
        match self.class_labels.get(class) {
            Some(label) => format!("{}:{}", class + 1, label),
            None => "?".to_string(),
        }
    }
}
