//! Fold generation: partitioning row indices into train/test splits.

use crate::data::Dataset;
use crate::error::CvError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Configuration value that selects leave-one-out.
pub const LEAVE_ONE_OUT: i64 = -1;

/// Number of folds to partition a dataset into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Folds {
    /// `k >= 2` folds.
    K(usize),
    /// One fold per row.
    LeaveOneOut,
}

impl Folds {
    pub fn new(k: usize) -> Result<Self, CvError> {
        if k < 2 {
            return Err(CvError::invalid_folds(format!(
                "fold count must be at least 2, got {k}"
            )));
        }
        Ok(Self::K(k))
    }

    /// Fold count for a dataset of `num_rows` rows.
    pub fn actual(&self, num_rows: usize) -> Result<usize, CvError> {
        let k = match self {
            Self::K(k) => *k,
            Self::LeaveOneOut => num_rows,
        };
        if num_rows < 2 {
            return Err(CvError::invalid_folds(format!(
                "cross-validation needs at least 2 rows, got {num_rows}"
            )));
        }
        if k > num_rows {
            return Err(CvError::invalid_folds(format!(
                "cannot split {num_rows} rows into {k} folds"
            )));
        }
        Ok(k)
    }
}

impl Default for Folds {
    fn default() -> Self {
        Self::K(10)
    }
}

impl TryFrom<i64> for Folds {
    type Error = CvError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            LEAVE_ONE_OUT => Ok(Self::LeaveOneOut),
            v if v >= 2 => Self::new(v as usize),
            v => Err(CvError::invalid_folds(format!(
                "fold count must be >= 2 or {LEAVE_ONE_OUT} for leave-one-out, got {v}"
            ))),
        }
    }
}

impl From<Folds> for i64 {
    fn from(folds: Folds) -> Self {
        match folds {
            Folds::K(k) => k as i64,
            Folds::LeaveOneOut => LEAVE_ONE_OUT,
        }
    }
}

impl std::fmt::Display for Folds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::K(k) => write!(f, "{k}"),
            Self::LeaveOneOut => write!(f, "leave-one-out"),
        }
    }
}

/// Row indices of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Produces the folds of a cross-validation run.
///
/// Implementations must be deterministic for a given seed, return folds in
/// index order and place every row in exactly one test set.
pub trait FoldGenerator: Send + Sync {
    fn generate(&self, data: &Dataset, folds: Folds, seed: u64) -> Result<Vec<FoldSplit>, CvError>;
}

/// Seeded shuffle, optional stratification by class, round-robin dealing.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedFoldGenerator {
    pub stratify: bool,
}

impl StratifiedFoldGenerator {
    pub fn new(stratify: bool) -> Self {
        Self { stratify }
    }
}

impl Default for StratifiedFoldGenerator {
    fn default() -> Self {
        Self { stratify: true }
    }
}

impl FoldGenerator for StratifiedFoldGenerator {
    fn generate(&self, data: &Dataset, folds: Folds, seed: u64) -> Result<Vec<FoldSplit>, CvError> {
        let n = data.num_rows();
        let k = folds.actual(n)?;

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
        if self.stratify {
            // stable: rows of one class keep their shuffled order
            order.sort_by_key(|&i| data.rows()[i].class);
        }

        let mut fold_of = vec![0usize; n];
        let mut tests: Vec<Vec<usize>> = vec![Vec::with_capacity(n / k + 1); k];
        for (pos, &row) in order.iter().enumerate() {
            let fold = pos % k;
            fold_of[row] = fold;
            tests[fold].push(row);
        }

        Ok(tests
            .into_iter()
            .enumerate()
            .map(|(fold, test)| FoldSplit {
                fold,
                train: (0..n).filter(|&row| fold_of[row] != fold).collect(),
                test,
            })
            .collect())
    }
}

/// Where every dataset row ended up as a test row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalIndexMap {
    /// Original row index for each position of the concatenated test sets,
    /// i.e. for each aggregated prediction in fold order.
    pub order: Vec<usize>,
    /// Test fold of each original row.
    pub fold_of_row: Vec<usize>,
}

impl OriginalIndexMap {
    /// Build the map, checking that the test sets partition `0..num_rows`.
    pub fn from_splits(splits: &[FoldSplit], num_rows: usize) -> Result<Self, CvError> {
        let mut fold_of_row: Vec<Option<usize>> = vec![None; num_rows];
        let mut order = Vec::with_capacity(num_rows);
        for split in splits {
            for &row in &split.test {
                let slot = fold_of_row.get_mut(row).ok_or_else(|| {
                    CvError::invalid_folds(format!(
                        "fold {} references row {row} outside 0..{num_rows}",
                        split.fold
                    ))
                })?;
                if let Some(previous) = slot {
                    return Err(CvError::invalid_folds(format!(
                        "row {row} is a test row in both fold {previous} and fold {}",
                        split.fold
                    )));
                }
                *slot = Some(split.fold);
                order.push(row);
            }
        }
        let fold_of_row = fold_of_row
            .into_iter()
            .enumerate()
            .map(|(row, fold)| {
                fold.ok_or_else(|| {
                    CvError::invalid_folds(format!("row {row} is not in any test fold"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { order, fold_of_row })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Original row index of the prediction at `position`.
    pub fn original_index(&self, position: usize) -> Option<usize> {
        self.order.get(position).copied()
    }

    pub fn fold_of(&self, row: usize) -> Option<usize> {
        self.fold_of_row.get(row).copied()
    }
}
