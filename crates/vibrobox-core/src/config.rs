//! Test profiles
//!
//! A [`TestProfile`] is built once per launch from the base defaults
//! ([`TestProfile::for_patient`]), optionally edited by the operator, then
//! validated and frozen for the duration of a run.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::sequencer::{self, DESCENDING_ANCHOR};
use crate::types::{Intensity, MotorIndex, SamplingMode};

// ============================================================================
// Shared sections
// ============================================================================

/// Inclusive motor range with a selection step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorRange {
    /// First motor index
    pub start: MotorIndex,
    /// Last motor index (inclusive)
    pub end: MotorIndex,
    /// Step between selected motors
    pub step: usize,
}

impl Default for MotorRange {
    fn default() -> Self {
        Self {
            start: 0,
            end: 5,
            step: 2,
        }
    }
}

impl MotorRange {
    /// Selected motors: `start, start + step, ...` up to `end` inclusive.
    #[must_use]
    pub fn motors(&self) -> Vec<MotorIndex> {
        if self.step == 0 || self.start > self.end {
            return Vec::new();
        }
        (self.start..=self.end).step_by(self.step).collect()
    }

    /// Check the range against the physical motor count.
    pub fn validate(&self, motor_count: usize) -> ConfigResult<()> {
        if motor_count == 0 {
            return Err(ConfigError::NoMotors);
        }
        if self.step == 0 {
            return Err(ConfigError::ZeroStep);
        }
        if self.start > self.end {
            return Err(ConfigError::EmptyMotorRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.end >= motor_count {
            return Err(ConfigError::MotorOutOfRange {
                motor: self.end,
                motor_count,
            });
        }
        Ok(())
    }
}

/// Timing of presentations and pauses, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Exposure per motor pulse in the spatial and discrimination tests
    pub exposure_ms: u64,
    /// Exposure per staircase step
    pub threshold_exposure_ms: u64,
    /// Pause after each answered staircase step or discrimination trial
    pub step_pause_ms: u64,
    /// Pause after each answered spatial trial
    pub spatial_pause_ms: u64,
    /// Pause after the separator indicator that closes a staircase pass
    pub pass_pause_ms: u64,
    /// Exposure per item during demo playback
    pub demo_exposure_ms: u64,
    /// Pause between items during demo playback
    pub demo_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            exposure_ms: 250,
            threshold_exposure_ms: 500,
            step_pause_ms: 350,
            spatial_pause_ms: 500,
            pass_pause_ms: 500,
            demo_exposure_ms: 600,
            demo_pause_ms: 300,
        }
    }
}

impl TimingConfig {
    /// Timing with every phase set to `ms` (useful for simulations)
    #[must_use]
    pub fn uniform(ms: u64) -> Self {
        Self {
            exposure_ms: ms,
            threshold_exposure_ms: ms,
            step_pause_ms: ms,
            spatial_pause_ms: ms,
            pass_pause_ms: ms,
            demo_exposure_ms: ms,
            demo_pause_ms: ms,
        }
    }

    /// Exposure per pulse for categorical tests
    #[must_use]
    pub fn exposure(&self) -> Duration {
        Duration::from_millis(self.exposure_ms)
    }

    /// Exposure per staircase step
    #[must_use]
    pub fn threshold_exposure(&self) -> Duration {
        Duration::from_millis(self.threshold_exposure_ms)
    }

    /// Pause after a staircase step or discrimination trial
    #[must_use]
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    /// Pause after a spatial trial
    #[must_use]
    pub fn spatial_pause(&self) -> Duration {
        Duration::from_millis(self.spatial_pause_ms)
    }

    /// Pause after a staircase pass
    #[must_use]
    pub fn pass_pause(&self) -> Duration {
        Duration::from_millis(self.pass_pause_ms)
    }

    /// Exposure during demo playback
    #[must_use]
    pub fn demo_exposure(&self) -> Duration {
        Duration::from_millis(self.demo_exposure_ms)
    }

    /// Pause between demo items
    #[must_use]
    pub fn demo_pause(&self) -> Duration {
        Duration::from_millis(self.demo_pause_ms)
    }
}

/// Start/end-of-test indicator: all motors blink together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Intensity applied to every motor
    pub intensity: Intensity,
    /// Number of pulses
    pub repeats: u32,
    /// On and off time per pulse
    pub pause_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            intensity: 20,
            repeats: 2,
            pause_ms: 250,
        }
    }
}

impl IndicatorConfig {
    /// On/off time per pulse
    #[must_use]
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

// ============================================================================
// Per-test sections
// ============================================================================

/// Staircase parameters for the threshold-finding test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Descending and ascending passes per motor (each)
    pub repeats: usize,
    /// Lower bound of the descending walk (exclusive)
    pub end_down: Intensity,
    /// Upper bound of the ascending walk (exclusive), also the exhausted result
    pub end_up: Intensity,
    /// Descending step; only its magnitude is used
    pub delta_down: i16,
    /// Ascending step
    pub delta_up: Intensity,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            repeats: 3,
            end_down: 0,
            end_up: 30,
            delta_down: -5,
            delta_up: 2,
        }
    }
}

impl ThresholdConfig {
    /// Magnitude of the descending step, saturated into the intensity range
    #[must_use]
    pub fn down_step(&self) -> Intensity {
        Intensity::try_from(self.delta_down.unsigned_abs()).unwrap_or(Intensity::MAX)
    }

    /// Check the staircase parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.repeats == 0 {
            return Err(ConfigError::ZeroCount {
                parameter: "threshold.repeats",
            });
        }
        if self.delta_down == 0 {
            return Err(ConfigError::InvalidStaircase {
                parameter: "delta_down",
                reason: "step must be non-zero".to_string(),
            });
        }
        if self.delta_up == 0 {
            return Err(ConfigError::InvalidStaircase {
                parameter: "delta_up",
                reason: "step must be non-zero".to_string(),
            });
        }
        if self.end_down >= DESCENDING_ANCHOR {
            return Err(ConfigError::InvalidStaircase {
                parameter: "end_down",
                reason: format!("must be below the descending anchor {DESCENDING_ANCHOR}"),
            });
        }
        if self.end_up == 0 {
            return Err(ConfigError::InvalidStaircase {
                parameter: "end_up",
                reason: "must be above zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Spatial-localization parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Total number of presentations
    pub samples: usize,
    /// Intensity of every pulse
    pub intensity: Intensity,
    /// Region layout
    pub mode: SamplingMode,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            intensity: 30,
            mode: SamplingMode::Pairs,
        }
    }
}

/// Intensity-discrimination parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminationConfig {
    /// Intensity schedule, one entry per level
    pub levels: Vec<Intensity>,
    /// Presentations of each level per motor
    pub repeats: usize,
}

impl Default for DiscriminationConfig {
    fn default() -> Self {
        Self {
            levels: vec![14, 22, 36, 60, 100],
            repeats: 4,
        }
    }
}

impl DiscriminationConfig {
    /// Levels sorted by intensity; index `i` is level `i + 1`.
    #[must_use]
    pub fn sorted_levels(&self) -> Vec<Intensity> {
        let mut levels = self.levels.clone();
        levels.sort_unstable();
        levels
    }

    /// Check the schedule.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.levels.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if self.repeats == 0 {
            return Err(ConfigError::ZeroCount {
                parameter: "discrimination.repeats",
            });
        }
        let mut seen = BTreeSet::new();
        for &intensity in &self.levels {
            if !seen.insert(intensity) {
                return Err(ConfigError::DuplicateLevel { intensity });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Complete parameter set for one patient session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestProfile {
    /// Patient surname, used for the summary and output directories
    pub surname: String,
    /// Number of motors on the array (frame length)
    pub motor_count: usize,
    /// Motors selected for testing
    pub motors: MotorRange,
    /// Presentation timing
    pub timing: TimingConfig,
    /// Start/end indicator
    pub indicator: IndicatorConfig,
    /// Threshold-finding test
    pub threshold: ThresholdConfig,
    /// Spatial-localization test
    pub spatial: SpatialConfig,
    /// Intensity-discrimination test
    pub discrimination: DiscriminationConfig,
    /// Seed for stimulus randomisation; fresh entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TestProfile {
    fn default() -> Self {
        Self::for_patient("")
    }
}

impl TestProfile {
    /// Base profile for a patient.
    #[must_use]
    pub fn for_patient(surname: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            motor_count: 10,
            motors: MotorRange::default(),
            timing: TimingConfig::default(),
            indicator: IndicatorConfig::default(),
            threshold: ThresholdConfig::default(),
            spatial: SpatialConfig::default(),
            discrimination: DiscriminationConfig::default(),
            seed: None,
        }
    }

    /// Selected motors
    #[must_use]
    pub fn selected_motors(&self) -> Vec<MotorIndex> {
        self.motors.motors()
    }

    /// Shared checks: motor range against the array.
    pub fn validate(&self) -> ConfigResult<()> {
        self.motors.validate(self.motor_count)
    }

    /// Everything the threshold test needs.
    pub fn validate_threshold(&self) -> ConfigResult<()> {
        self.validate()?;
        self.threshold.validate()
    }

    /// Everything the spatial test needs, including a non-empty region pool.
    pub fn validate_spatial(&self) -> ConfigResult<()> {
        self.validate()?;
        if self.spatial.samples == 0 {
            return Err(ConfigError::ZeroCount {
                parameter: "spatial.samples",
            });
        }
        if sequencer::spatial_regions(&self.motors, self.spatial.mode).is_empty() {
            return Err(ConfigError::NoRegions {
                mode: self.spatial.mode.as_str(),
                start: self.motors.start,
                end: self.motors.end,
            });
        }
        Ok(())
    }

    /// Everything the discrimination test needs.
    pub fn validate_discrimination(&self) -> ConfigResult<()> {
        self.validate()?;
        self.discrimination.validate()
    }
}
