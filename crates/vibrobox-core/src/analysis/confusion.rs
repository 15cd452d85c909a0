//! Confusion matrices over 1-based categories

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::Category;

/// Square count matrix: rows are true categories, columns observed ones.
///
/// Built in a single pass by [`ConfusionMatrix::from_pairs`]; there is no
/// per-cell mutation API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u32>>", into = "Vec<Vec<u32>>")]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u32>>,
}

impl ConfusionMatrix {
    /// Empty `categories × categories` matrix
    #[must_use]
    pub fn zeros(categories: usize) -> Self {
        Self {
            counts: vec![vec![0; categories]; categories],
        }
    }

    /// Count `(true, observed)` pairs over `categories` 1-based categories.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::CategoryOutOfRange`] if either side of a pair
    /// falls outside `1..=categories`.
    pub fn from_pairs<I>(categories: usize, pairs: I) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = (Category, Category)>,
    {
        let mut counts = vec![vec![0u32; categories]; categories];
        for (truth, observed) in pairs {
            let row = Self::slot(truth, categories)?;
            let col = Self::slot(observed, categories)?;
            counts[row][col] += 1;
        }
        Ok(Self { counts })
    }

    fn slot(category: Category, categories: usize) -> AnalysisResult<usize> {
        let index = category as usize;
        if index == 0 || index > categories {
            return Err(AnalysisError::CategoryOutOfRange {
                category,
                categories,
            });
        }
        Ok(index - 1)
    }

    /// Number of categories
    #[must_use]
    pub fn categories(&self) -> usize {
        self.counts.len()
    }

    /// Raw counts, row-major
    #[must_use]
    pub fn counts(&self) -> &[Vec<u32>] {
        &self.counts
    }

    /// Number of trials whose true category is row `row` (0-based)
    #[must_use]
    pub fn row_total(&self, row: usize) -> u32 {
        self.counts.get(row).map_or(0, |r| r.iter().sum())
    }

    /// Total number of trials
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }

    /// Row-normalised matrix: `count / max(1, row_total)`.
    #[must_use]
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total = f64::from(row.iter().sum::<u32>().max(1));
                row.iter().map(|&c| f64::from(c) / total).collect()
            })
            .collect()
    }

    /// Per-category accuracy (normalised diagonal); 0.0 for empty rows.
    #[must_use]
    pub fn accuracy(&self) -> Vec<f64> {
        self.normalized()
            .iter()
            .enumerate()
            .map(|(i, row)| row.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Arithmetic mean of the per-category accuracies.
    #[must_use]
    pub fn mean_accuracy(&self) -> f64 {
        let accuracy = self.accuracy();
        if accuracy.is_empty() {
            return 0.0;
        }
        accuracy.iter().sum::<f64>() / accuracy.len() as f64
    }
}

impl TryFrom<Vec<Vec<u32>>> for ConfusionMatrix {
    type Error = AnalysisError;

    /// Adopt raw counts, rejecting ragged or non-square input.
    fn try_from(counts: Vec<Vec<u32>>) -> AnalysisResult<Self> {
        let categories = counts.len();
        if let Some((row, cells)) = counts.iter().enumerate().find(|(_, r)| r.len() != categories) {
            return Err(AnalysisError::NotSquare {
                row,
                len: cells.len(),
                categories,
            });
        }
        Ok(Self { counts })
    }
}

impl From<ConfusionMatrix> for Vec<Vec<u32>> {
    fn from(matrix: ConfusionMatrix) -> Self {
        matrix.counts
    }
}
