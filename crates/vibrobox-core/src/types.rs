//! Core data types shared by the sequencer, the engines and the analyzer
//!
//! Everything here is a plain value: stimuli and trials are created once and
//! moved across the engine/control boundary, never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// PWM intensity sent to a single motor (0 = off)
pub type Intensity = u8;

/// Zero-based motor index on the array
pub type MotorIndex = usize;

/// One-based category (region or level) used in confusion matrices
pub type Category = u32;

// ============================================================================
// Stimulus
// ============================================================================

/// One addressable unit of actuation.
///
/// Multi-motor stimuli (spatial pairs) are pulsed one motor at a time, in the
/// listed order, each for one exposure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Target motors
    pub motors: Vec<MotorIndex>,
    /// PWM intensity
    pub intensity: Intensity,
}

impl Stimulus {
    /// Stimulus on a single motor
    #[must_use]
    pub fn single(motor: MotorIndex, intensity: Intensity) -> Self {
        Self {
            motors: vec![motor],
            intensity,
        }
    }

    /// Build the per-motor frames for this stimulus on an array of
    /// `motor_count` motors, one frame per target motor.
    ///
    /// Motors outside the array are left at zero.
    #[must_use]
    pub fn frames(&self, motor_count: usize) -> Vec<Vec<Intensity>> {
        self.motors
            .iter()
            .map(|&motor| {
                let mut frame = vec![0; motor_count];
                if let Some(slot) = frame.get_mut(motor) {
                    *slot = self.intensity;
                }
                frame
            })
            .collect()
    }
}

// ============================================================================
// Trials
// ============================================================================

/// A completed, answered presentation in a categorical test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in presentation order (0-based)
    pub order: usize,
    /// What was presented
    pub stimulus: Stimulus,
    /// True category (region or level)
    pub expected: Category,
    /// Category reported by the patient
    pub observed: Category,
}

impl Trial {
    /// Whether the response matched the true category
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.expected == self.observed
    }

    /// `(true, observed)` pair as persisted in run results
    #[must_use]
    pub fn pair(&self) -> (Category, Category) {
        (self.expected, self.observed)
    }
}

/// Direction of one staircase pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaircaseDirection {
    /// Start above threshold and walk down until the stimulus is lost
    Descending,
    /// Start below threshold and walk up until the stimulus is felt
    Ascending,
}

impl StaircaseDirection {
    /// Response value that stops a pass in this direction
    #[must_use]
    pub const fn stopping_response(self) -> bool {
        match self {
            Self::Descending => false,
            Self::Ascending => true,
        }
    }
}

impl fmt::Display for StaircaseDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descending => f.write_str("decreasing intensity"),
            Self::Ascending => f.write_str("increasing intensity"),
        }
    }
}

/// One answered step of a staircase pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaircaseStep {
    /// Motor under test
    pub motor: MotorIndex,
    /// Pass direction
    pub direction: StaircaseDirection,
    /// Presented intensity
    pub intensity: Intensity,
    /// Whether the patient felt it
    pub felt: bool,
}

// ============================================================================
// Spatial regions
// ============================================================================

/// Region sampling mode for the spatial test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Each region is two adjacent motors
    #[default]
    Pairs,
    /// Each region is one motor
    Single,
}

impl SamplingMode {
    /// Lowercase name used in results and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pairs => "pairs",
            Self::Single => "single",
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SamplingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pairs" | "pair" => Ok(Self::Pairs),
            "single" => Ok(Self::Single),
            other => Err(format!("unknown sampling mode '{other}' (expected pairs or single)")),
        }
    }
}

/// One addressable spatial unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// 1-based region number shown to the patient
    pub index: Category,
    /// Motors that make up the region
    pub motors: Vec<MotorIndex>,
}

impl Region {
    /// Stimulus for this region at the given intensity
    #[must_use]
    pub fn stimulus(&self, intensity: Intensity) -> Stimulus {
        Stimulus {
            motors: self.motors.clone(),
            intensity,
        }
    }
}

// ============================================================================
// Run results
// ============================================================================

/// Threshold test result: motor → estimated threshold intensity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdResult {
    /// Averaged threshold per motor
    pub thresholds: BTreeMap<MotorIndex, Intensity>,
}

impl ThresholdResult {
    /// Threshold of one motor, if it was measured
    #[must_use]
    pub fn threshold(&self, motor: MotorIndex) -> Option<Intensity> {
        self.thresholds.get(&motor).copied()
    }
}

/// Spatial test result: raw answers plus sampling mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialResult {
    /// `(true_region, response_region)` in presentation order
    pub answers: Vec<(Category, Category)>,
    /// Sampling mode used
    pub mode: SamplingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stimulus_frames() {
        let stim = Stimulus {
            motors: vec![2, 3],
            intensity: 30,
        };
        let frames = stim.frames(5);
        assert_eq!(frames, vec![vec![0, 0, 30, 0, 0], vec![0, 0, 0, 30, 0]]);
    }

    #[test]
    fn test_stimulus_frames_ignore_missing_motor() {
        let frames = Stimulus::single(9, 40).frames(4);
        assert_eq!(frames, vec![vec![0; 4]]);
    }

    #[test]
    fn test_stopping_response() {
        assert!(!StaircaseDirection::Descending.stopping_response());
        assert!(StaircaseDirection::Ascending.stopping_response());
    }

    #[test]
    fn test_sampling_mode_parse() {
        assert_eq!("pairs".parse::<SamplingMode>(), Ok(SamplingMode::Pairs));
        assert_eq!("Single".parse::<SamplingMode>(), Ok(SamplingMode::Single));
        assert!("triples".parse::<SamplingMode>().is_err());
    }

    #[test]
    fn test_threshold_result_serializes_as_map() {
        let mut result = ThresholdResult::default();
        result.thresholds.insert(0, 12);
        result.thresholds.insert(2, 9);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"0":12,"2":9}"#);
    }

    #[test]
    fn test_spatial_result_schema() {
        let result = SpatialResult {
            answers: vec![(1, 2), (3, 3)],
            mode: SamplingMode::Single,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "single");
        assert_eq!(json["answers"][0][1], 2);
    }
}
