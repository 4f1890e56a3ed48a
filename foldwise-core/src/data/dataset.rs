//! In-memory dataset with a nominal class attribute.

use crate::error::CvError;
use serde::{Deserialize, Serialize};

/// A single row: numeric feature values plus the index of its class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<f64>,
    pub class: usize,
}

impl Row {
    pub fn new(values: Vec<f64>, class: usize) -> Self {
        Self { values, class }
    }
}

/// An ordered collection of rows sharing one schema.
///
/// The engine only ever reads a dataset; fold subsets are materialised
/// copies produced by [`Dataset::subset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    relation: String,
    attributes: Vec<String>,
    class_labels: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, checking that every row matches the schema.
    pub fn new(
        relation: impl Into<String>,
        attributes: Vec<String>,
        class_labels: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self, CvError> {
        if class_labels.is_empty() {
            return Err(CvError::dataset("at least one class label is required"));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != attributes.len() {
                return Err(CvError::dataset(format!(
                    "row {i} has {} values, expected {}",
                    row.values.len(),
                    attributes.len()
                )));
            }
            if row.class >= class_labels.len() {
                return Err(CvError::dataset(format!(
                    "row {i} has class index {} but only {} labels exist",
                    row.class,
                    class_labels.len()
                )));
            }
        }
        Ok(Self {
            relation: relation.into(),
            attributes,
            class_labels,
            rows,
        })
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows per class label, indexed by class.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.class_labels.len()];
        for row in &self.rows {
            counts[row.class] += 1;
        }
        counts
    }

    /// Copy the rows at `indices`, in the order given, into a new dataset
    /// with the same schema.
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset, CvError> {
        let mut rows = Vec::with_capacity(indices.len());
        for &i in indices {
            let row = self.rows.get(i).ok_or_else(|| {
                CvError::dataset(format!(
                    "row index {i} out of range for {} rows",
                    self.rows.len()
                ))
            })?;
            rows.push(row.clone());
        }
        Ok(Dataset {
            relation: self.relation.clone(),
            attributes: self.attributes.clone(),
            class_labels: self.class_labels.clone(),
            rows,
        })
    }
}
