//! Datasets and the sources they are loaded from.

pub mod dataset;
pub mod source;

pub use dataset::{Dataset, Row};
pub use source::{CsvSource, parse_csv};
