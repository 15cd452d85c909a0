//! Spatial-localization outcome reduction

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Category;

/// Statistics for one true region
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    /// Trials whose true region was this one
    pub total: u32,
    /// Correctly localised trials
    pub correct: u32,
    /// `correct / total`
    pub accuracy: f64,
    /// Reported region → count
    pub answers: BTreeMap<Category, u32>,
}

/// Per-region accuracy and the pooled mean accuracy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialOutcome {
    /// Statistics keyed by true region
    pub regions: BTreeMap<Category, RegionStats>,
    /// Total correct over total trials
    pub mean_accuracy: f64,
}

/// Reduce `(true_region, response_region)` pairs.
///
/// The mean is pooled over trials, so regions that received more
/// presentations weigh more.
#[must_use]
pub fn analyse_spatial(answers: &[(Category, Category)]) -> SpatialOutcome {
    let mut regions: BTreeMap<Category, RegionStats> = BTreeMap::new();
    for &(truth, response) in answers {
        let stats = regions.entry(truth).or_default();
        stats.total += 1;
        if truth == response {
            stats.correct += 1;
        }
        *stats.answers.entry(response).or_default() += 1;
    }

    let mut correct = 0u32;
    let mut total = 0u32;
    for stats in regions.values_mut() {
        stats.accuracy = f64::from(stats.correct) / f64::from(stats.total.max(1));
        correct += stats.correct;
        total += stats.total;
    }

    SpatialOutcome {
        regions,
        mean_accuracy: f64::from(correct) / f64::from(total.max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_region_stats() {
        let outcome = analyse_spatial(&[(1, 1), (1, 2), (2, 2), (2, 2), (1, 1)]);
        let first = &outcome.regions[&1];
        assert_eq!(first.total, 3);
        assert_eq!(first.correct, 2);
        assert!((first.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(first.answers[&1], 2);
        assert_eq!(first.answers[&2], 1);
        assert_eq!(outcome.regions[&2].accuracy, 1.0);
    }

    #[test]
    fn test_mean_is_pooled_not_averaged() {
        // Region 1: 1/4 correct, region 2: 1/1 correct.
        let outcome = analyse_spatial(&[(1, 1), (1, 2), (1, 2), (1, 3), (2, 2)]);
        assert!((outcome.mean_accuracy - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_answers() {
        let outcome = analyse_spatial(&[]);
        assert!(outcome.regions.is_empty());
        assert_eq!(outcome.mean_accuracy, 0.0);
    }
}
