//! Loading datasets from delimiter-separated text files.

use crate::data::dataset::{Dataset, Row};
use crate::error::CvError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_delimiter() -> char {
    ','
}

/// CSV file data source.
///
/// The first line is the header. The class column is the last column
/// unless `class_column` names another one; every other column must be
/// numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvSource {
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub class_column: Option<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: default_delimiter(),
            class_column: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_class_column(mut self, column: impl Into<String>) -> Self {
        self.class_column = Some(column.into());
        self
    }

    /// Read and parse the file.
    pub async fn load(&self) -> Result<Dataset, CvError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let relation = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let data = parse_csv(
            &relation,
            &content,
            self.delimiter,
            self.class_column.as_deref(),
        )?;
        tracing::debug!(
            path = %self.path.display(),
            rows = data.num_rows(),
            classes = data.num_classes(),
            "Loaded CSV dataset"
        );
        Ok(data)
    }
}

/// Parse CSV text into a dataset. Class labels are numbered in the order
/// they are first seen.
pub fn parse_csv(
    relation: &str,
    content: &str,
    delimiter: char,
    class_column: Option<&str>,
) -> Result<Dataset, CvError> {
    let mut lines = content.lines();

    let columns: Vec<String> = lines
        .next()
        .ok_or_else(|| CvError::dataset("Empty CSV file"))?
        .split(delimiter)
        .map(|s| s.trim().trim_matches('"').to_string())
        .collect();
    if columns.len() < 2 {
        return Err(CvError::dataset(
            "CSV needs at least one feature column and a class column",
        ));
    }

    let class_idx = match class_column {
        Some(name) => columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CvError::dataset(format!("class column '{name}' not found")))?,
        None => columns.len() - 1,
    };

    let attributes: Vec<String> = columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != class_idx)
        .map(|(_, c)| c.clone())
        .collect();

    let mut class_labels: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line
            .split(delimiter)
            .map(|s| s.trim().trim_matches('"'))
            .collect();
        if cells.len() != columns.len() {
            return Err(CvError::dataset(format!(
                "line {} has {} cells, expected {}",
                line_no + 2,
                cells.len(),
                columns.len()
            )));
        }

        let label = cells[class_idx];
        let class = match class_labels.iter().position(|l| l == label) {
            Some(idx) => idx,
            None => {
                class_labels.push(label.to_string());
                class_labels.len() - 1
            }
        };

        let mut values = Vec::with_capacity(attributes.len());
        for (i, cell) in cells.iter().enumerate() {
            if i == class_idx {
                continue;
            }
            let value = cell.parse::<f64>().map_err(|_| {
                CvError::dataset(format!(
                    "line {}: column '{}' is not numeric: '{cell}'",
                    line_no + 2,
                    columns[i]
                ))
            })?;
            values.push(value);
        }
        rows.push(Row::new(values, class));
    }

    Dataset::new(relation, attributes, class_labels, rows)
}
