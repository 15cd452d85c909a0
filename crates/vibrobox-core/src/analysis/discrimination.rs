//! Aggregate result of an intensity-discrimination session
//!
//! A session may be assembled from several engine runs (resumed batches,
//! rewritten motors); this module only sees the final per-motor trial lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::confusion::ConfusionMatrix;
use crate::error::AnalysisResult;
use crate::types::{Category, Intensity, MotorIndex, Trial};

/// Persisted discrimination result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscriminationResult {
    /// All `(true_level, response_level)` pairs, grouped by motor
    pub answers: Vec<(Category, Category)>,
    /// Fraction correct per motor (0.0 for motors without data)
    pub per_motor_accuracy: BTreeMap<MotorIndex, f64>,
    /// Mean of the per-motor accuracies
    pub mean_accuracy: f64,
    /// Confusion matrix over all motors
    pub confusion: ConfusionMatrix,
    /// Confusion matrix per motor with data
    pub confusion_per_motor: BTreeMap<MotorIndex, ConfusionMatrix>,
    /// Intensity of each level, ascending (level `i + 1` is `pwm_values[i]`)
    pub pwm_values: Vec<Intensity>,
    /// Presentations of each level per motor
    pub repeats: usize,
    /// Motors selected for the session
    pub motors: Vec<MotorIndex>,
}

impl DiscriminationResult {
    /// Build the aggregate from per-motor trials.
    ///
    /// `pwm_values` must be the sorted level schedule the trials were ranked
    /// against.
    ///
    /// # Errors
    ///
    /// Fails if a trial carries a level outside `1..=pwm_values.len()`.
    pub fn build(
        per_motor: &BTreeMap<MotorIndex, Vec<Trial>>,
        motors: &[MotorIndex],
        pwm_values: Vec<Intensity>,
        repeats: usize,
    ) -> AnalysisResult<Self> {
        let levels = pwm_values.len();

        let answers: Vec<(Category, Category)> = per_motor
            .values()
            .flat_map(|trials| trials.iter().map(Trial::pair))
            .collect();
        let confusion = ConfusionMatrix::from_pairs(levels, answers.iter().copied())?;

        let mut confusion_per_motor = BTreeMap::new();
        for (&motor, trials) in per_motor {
            let cm = ConfusionMatrix::from_pairs(levels, trials.iter().map(Trial::pair))?;
            confusion_per_motor.insert(motor, cm);
        }

        let per_motor_accuracy: BTreeMap<MotorIndex, f64> = motors
            .iter()
            .map(|motor| {
                let accuracy = per_motor
                    .get(motor)
                    .filter(|trials| !trials.is_empty())
                    .map_or(0.0, |trials| {
                        let correct = trials.iter().filter(|t| t.is_correct()).count();
                        correct as f64 / trials.len() as f64
                    });
                (*motor, accuracy)
            })
            .collect();

        let mean_accuracy = if per_motor_accuracy.is_empty() {
            0.0
        } else {
            per_motor_accuracy.values().sum::<f64>() / per_motor_accuracy.len() as f64
        };

        Ok(Self {
            answers,
            per_motor_accuracy,
            mean_accuracy,
            confusion,
            confusion_per_motor,
            pwm_values,
            repeats,
            motors: motors.to_vec(),
        })
    }
}
