//! Patient-level summary
//!
//! Combines whatever test outcomes are available into one document. Tests
//! that were not run are simply absent; that is never an error.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::analysis::{
    analyse_levels, analyse_spatial, DiscriminationResult, LevelAnalysis, SpatialOutcome,
};
use crate::error::AnalysisResult;
use crate::types::{Intensity, MotorIndex, SpatialResult, ThresholdResult};

/// Discrimination section of the summary
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscriminationSummary {
    /// Intensity of each level, ascending
    pub pwm_values: Vec<Intensity>,
    /// Level analysis per motor with data
    pub motors: BTreeMap<MotorIndex, LevelAnalysis>,
}

/// Patient summary document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Patient surname
    pub surname: String,
    /// When the summary was produced
    pub datetime: String,
    /// Threshold per motor
    #[serde(rename = "mols")]
    pub thresholds: Option<ThresholdResult>,
    /// Spatial outcome
    pub spatial: Option<SpatialOutcome>,
    /// Discrimination outcome per motor
    #[serde(rename = "pmpwm")]
    pub discrimination: DiscriminationSummary,
}

impl Summary {
    /// Reduce the available results into a summary.
    ///
    /// # Errors
    ///
    /// Fails only when a discrimination matrix does not match its intensity
    /// schedule.
    pub fn build(
        surname: impl Into<String>,
        datetime: impl Into<String>,
        thresholds: Option<&ThresholdResult>,
        spatial: Option<&SpatialResult>,
        discrimination: Option<&DiscriminationResult>,
    ) -> AnalysisResult<Self> {
        let discrimination = match discrimination {
            Some(result) => {
                let mut motors = BTreeMap::new();
                for (&motor, confusion) in &result.confusion_per_motor {
                    motors.insert(motor, analyse_levels(confusion, &result.pwm_values)?);
                }
                DiscriminationSummary {
                    pwm_values: result.pwm_values.clone(),
                    motors,
                }
            }
            None => DiscriminationSummary::default(),
        };

        Ok(Self {
            surname: surname.into(),
            datetime: datetime.into(),
            thresholds: thresholds.cloned(),
            spatial: spatial.map(|s| analyse_spatial(&s.answers)),
            discrimination,
        })
    }

    /// Short human-readable report.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Surname: {}\n", self.surname);

        out.push_str("=== Threshold test ===\n");
        match &self.thresholds {
            Some(result) if !result.thresholds.is_empty() => {
                for (motor, threshold) in &result.thresholds {
                    let _ = writeln!(out, "{motor} → {threshold} PWM");
                }
            }
            _ => out.push_str("Not run\n"),
        }
        out.push('\n');

        out.push_str("=== Spatial test ===\n");
        match &self.spatial {
            Some(outcome) => {
                for (region, stats) in &outcome.regions {
                    let accuracy = stats.accuracy * 100.0;
                    let _ = writeln!(out, "Region {region}: {accuracy:.0} %");
                    if stats.correct < stats.total {
                        out.push_str("    Answers:\n");
                        for (answer, count) in &stats.answers {
                            let _ = writeln!(out, "        region {answer}: {count}");
                        }
                    }
                }
                let _ = writeln!(
                    out,
                    "\nMean accuracy: {:.1} %",
                    outcome.mean_accuracy * 100.0
                );
            }
            None => out.push_str("Not run\n"),
        }
        out.push('\n');

        out.push_str("=== Discrimination test ===\n");
        if self.discrimination.motors.is_empty() {
            out.push_str("Not run\n");
        }
        for (motor, analysis) in &self.discrimination.motors {
            let _ = writeln!(
                out,
                "Motor {motor}: mean accuracy {:4.1} %",
                analysis.mean_accuracy * 100.0
            );
            for (level, accuracy) in &analysis.accuracy {
                let _ = writeln!(out, "  Level {level}: {:4.1} %", accuracy * 100.0);
            }
            out.push_str("  Recommendations:\n");
            for recommendation in &analysis.recommendations {
                let _ = writeln!(out, "   • {recommendation}");
            }
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SamplingMode, Stimulus, Trial};

    fn discrimination() -> DiscriminationResult {
        let trials = vec![
            Trial {
                order: 0,
                stimulus: Stimulus::single(1, 10),
                expected: 1,
                observed: 1,
            },
            Trial {
                order: 1,
                stimulus: Stimulus::single(1, 20),
                expected: 2,
                observed: 2,
            },
        ];
        let mut per_motor = BTreeMap::new();
        per_motor.insert(1, trials);
        DiscriminationResult::build(&per_motor, &[1, 3], vec![10, 20], 1).unwrap()
    }

    #[test]
    fn test_full_summary() {
        let mut thresholds = ThresholdResult::default();
        thresholds.thresholds.insert(1, 12);
        let spatial = SpatialResult {
            answers: vec![(1, 1), (2, 1)],
            mode: SamplingMode::Pairs,
        };
        let summary = Summary::build(
            "Ivanov",
            "2025-08-05T12-30-00",
            Some(&thresholds),
            Some(&spatial),
            Some(&discrimination()),
        )
        .unwrap();

        assert_eq!(summary.spatial.as_ref().unwrap().mean_accuracy, 0.5);
        // Motor 3 had no data and is left out.
        assert_eq!(summary.discrimination.motors.len(), 1);
        assert_eq!(summary.discrimination.motors[&1].mean_accuracy, 1.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["mols"]["1"], 12);
        assert_eq!(json["pmpwm"]["pwm_values"][1], 20);
        assert!(json["pmpwm"]["motors"]["1"]["recommendations"].is_array());

        let text = summary.render_text();
        assert!(text.contains("1 → 12 PWM"));
        assert!(text.contains("Region 2: 0 %"));
        assert!(text.contains("Motor 1: mean accuracy"));
    }

    #[test]
    fn test_missing_tests_are_null() {
        let summary = Summary::build("Anon", "now", None, None, None).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["mols"].is_null());
        assert!(json["spatial"].is_null());
        assert!(json["pmpwm"]["motors"].as_object().unwrap().is_empty());
        assert!(summary.render_text().contains("Not run"));
    }
}
