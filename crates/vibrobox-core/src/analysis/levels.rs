//! Level accuracy and scale-correction recommendations
//!
//! Given one motor's confusion matrix and the intensity behind every level,
//! [`analyse_levels`] reports per-level accuracy and suggests how to reshape
//! the intensity scale:
//!
//! 1. Levels below [`ACCURACY_FLOOR`] are grouped into contiguous runs. A lone
//!    level should be removed; a run should be merged into one level at the
//!    rounded mean intensity. Nothing else is checked when any level fails.
//! 2. Otherwise the first pair (ascending) confused both ways at
//!    [`CROSS_CONFUSION_FLOOR`] or more should be merged.
//! 3. Otherwise no correction is needed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::confusion::ConfusionMatrix;
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{Category, Intensity};

/// Minimum acceptable per-level accuracy
pub const ACCURACY_FLOOR: f64 = 0.75;

/// Mutual confusion rate that marks two levels as indistinguishable
pub const CROSS_CONFUSION_FLOOR: f64 = 0.10;

/// Scale-correction directive for the discrimination schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recommendation {
    /// Drop a single poorly recognised level
    RemoveLevel {
        /// 1-based level
        level: Category,
        /// Its intensity
        intensity: Intensity,
    },
    /// Collapse a contiguous run of poorly recognised levels
    MergeLevels {
        /// 1-based levels, ascending
        levels: Vec<Category>,
        /// Suggested representative intensity
        intensity: Intensity,
    },
    /// Collapse two levels that are confused with each other
    MergeConfusedPair {
        /// Lower 1-based level
        first: Category,
        /// Higher 1-based level
        second: Category,
        /// Suggested representative intensity
        intensity: Intensity,
    },
    /// Scale is fine as is
    NoCorrection,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveLevel { level, intensity } => write!(
                f,
                "Remove level {level} (PWM {intensity}): accuracy below 75 %"
            ),
            Self::MergeLevels { levels, intensity } => {
                let list: Vec<String> = levels.iter().map(ToString::to_string).collect();
                write!(f, "Merge levels [{}] into one (~PWM {intensity})", list.join(", "))
            }
            Self::MergeConfusedPair {
                first,
                second,
                intensity,
            } => write!(
                f,
                "Strong confusion between {first} and {second}: merge, PWM ≈ {intensity}"
            ),
            Self::NoCorrection => f.write_str(
                "No correction needed (accuracy ≥ 75 %, no strong cross-confusion)",
            ),
        }
    }
}

/// Accuracy table and recommendations for one motor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelAnalysis {
    /// Raw counts
    pub confusion: ConfusionMatrix,
    /// Row-normalised matrix, rounded to 4 decimals
    pub confusion_norm: Vec<Vec<f64>>,
    /// Accuracy per 1-based level, rounded to 4 decimals
    pub accuracy: BTreeMap<Category, f64>,
    /// Mean of the per-level accuracies, rounded to 4 decimals
    pub mean_accuracy: f64,
    /// Scale-correction directives
    pub recommendations: Vec<Recommendation>,
}

/// Analyse one confusion matrix against its level intensities.
///
/// # Errors
///
/// Returns [`AnalysisError::IntensityCountMismatch`] when `intensities` does
/// not have one entry per category.
pub fn analyse_levels(
    confusion: &ConfusionMatrix,
    intensities: &[Intensity],
) -> AnalysisResult<LevelAnalysis> {
    if confusion.categories() != intensities.len() {
        return Err(AnalysisError::IntensityCountMismatch {
            categories: confusion.categories(),
            intensities: intensities.len(),
        });
    }

    let norm = confusion.normalized();
    let accuracy = confusion.accuracy();
    let recommendations = recommend(&norm, &accuracy, intensities);

    Ok(LevelAnalysis {
        confusion: confusion.clone(),
        confusion_norm: norm
            .iter()
            .map(|row| row.iter().map(|&v| round4(v)).collect())
            .collect(),
        accuracy: accuracy
            .iter()
            .enumerate()
            .map(|(i, &a)| (category(i), round4(a)))
            .collect(),
        mean_accuracy: round4(confusion.mean_accuracy()),
        recommendations,
    })
}

/// Recommendation list from a normalised matrix and per-level accuracy.
///
/// Pure: the same inputs always produce the same list.
#[must_use]
pub fn recommend(norm: &[Vec<f64>], accuracy: &[f64], intensities: &[Intensity]) -> Vec<Recommendation> {
    let low: Vec<usize> = accuracy
        .iter()
        .enumerate()
        .filter(|(_, &a)| a < ACCURACY_FLOOR)
        .map(|(i, _)| i)
        .collect();

    if !low.is_empty() {
        return contiguous_runs(&low)
            .into_iter()
            .map(|run| {
                if let [only] = run.as_slice() {
                    Recommendation::RemoveLevel {
                        level: category(*only),
                        intensity: intensity_at(intensities, *only),
                    }
                } else {
                    Recommendation::MergeLevels {
                        levels: run.iter().map(|&i| category(i)).collect(),
                        intensity: mean_intensity(run.iter().map(|&i| intensity_at(intensities, i))),
                    }
                }
            })
            .collect();
    }

    let cell = |i: usize, j: usize| norm.get(i).and_then(|row| row.get(j)).copied().unwrap_or(0.0);
    let n = norm.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if cell(i, j) >= CROSS_CONFUSION_FLOOR && cell(j, i) >= CROSS_CONFUSION_FLOOR {
                return vec![Recommendation::MergeConfusedPair {
                    first: category(i),
                    second: category(j),
                    intensity: mean_intensity(
                        [intensity_at(intensities, i), intensity_at(intensities, j)].into_iter(),
                    ),
                }];
            }
        }
    }

    vec![Recommendation::NoCorrection]
}

/// Split sorted indices into runs of consecutive values.
fn contiguous_runs(sorted: &[usize]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for &index in sorted {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|&last| last + 1 == index) => run.push(index),
            _ => runs.push(vec![index]),
        }
    }
    runs
}

fn mean_intensity(values: impl Iterator<Item = Intensity>) -> Intensity {
    let (sum, count) = values.fold((0.0_f64, 0u32), |(s, c), v| (s + f64::from(v), c + 1));
    if count == 0 {
        return 0;
    }
    (sum / f64::from(count))
        .round_ties_even()
        .clamp(0.0, f64::from(Intensity::MAX)) as Intensity
}

fn intensity_at(intensities: &[Intensity], index: usize) -> Intensity {
    intensities.get(index).copied().unwrap_or(0)
}

fn category(index: usize) -> Category {
    Category::try_from(index + 1).unwrap_or(Category::MAX)
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
