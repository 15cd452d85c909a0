//! Training playback
//!
//! Before (or in the middle of) a test the operator can show the patient what
//! each answer corresponds to. No answers are collected.

use std::time::Duration;

use vibrobox_core::sequencer::spatial_regions;
use vibrobox_core::{ConfigError, ConfigResult, MotorIndex, SamplingMode, Stimulus, TestProfile};

use super::session::{Procedure, Session, Step};
use super::RunOutcome;

/// A fixed sequence of stimuli played back in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoPlayback {
    stimuli: Vec<Stimulus>,
    exposure: Duration,
    pause: Duration,
}

impl DemoPlayback {
    /// Every spatial region once, in region order.
    ///
    /// A pair region pulses its two motors one after the other, splitting
    /// the demo exposure between them.
    ///
    /// # Errors
    ///
    /// Same checks as the spatial test.
    pub fn spatial(profile: &TestProfile) -> ConfigResult<Self> {
        profile.validate_spatial()?;
        let stimuli = spatial_regions(&profile.motors, profile.spatial.mode)
            .iter()
            .map(|region| region.stimulus(profile.spatial.intensity))
            .collect();
        let exposure = match profile.spatial.mode {
            SamplingMode::Pairs => profile.timing.demo_exposure() / 2,
            SamplingMode::Single => profile.timing.demo_exposure(),
        };
        Ok(Self {
            stimuli,
            exposure,
            pause: profile.timing.demo_pause(),
        })
    }

    /// Every discrimination level on every motor, weakest first.
    ///
    /// # Errors
    ///
    /// Same checks as the discrimination test.
    pub fn levels(profile: &TestProfile, motors: &[MotorIndex]) -> ConfigResult<Self> {
        profile.validate_discrimination()?;
        if let Some(&motor) = motors.iter().find(|&&m| m >= profile.motor_count) {
            return Err(ConfigError::MotorOutOfRange {
                motor,
                motor_count: profile.motor_count,
            });
        }
        let levels = profile.discrimination.sorted_levels();
        let stimuli = motors
            .iter()
            .flat_map(|&motor| levels.iter().map(move |&level| Stimulus::single(motor, level)))
            .collect();
        Ok(Self {
            stimuli,
            exposure: profile.timing.demo_exposure(),
            pause: profile.timing.demo_pause(),
        })
    }

    /// Stimuli in playback order
    #[must_use]
    pub fn stimuli(&self) -> &[Stimulus] {
        &self.stimuli
    }

    async fn execute(&self, session: &mut Session<()>) -> Step<usize> {
        for stimulus in &self.stimuli {
            session.present(stimulus, self.exposure).await?;
            session.pause(self.pause).await?;
        }
        Ok(self.stimuli.len())
    }
}

impl Procedure for DemoPlayback {
    type Answer = ();
    type Output = usize;

    const NAME: &'static str = "demo";

    async fn run(self, session: &mut Session<()>) -> RunOutcome<usize> {
        tracing::info!(stimuli = self.stimuli.len(), "Training playback");
        let result = self.execute(session).await;
        session.conclude(Self::NAME, result, || None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_demo_order() {
        let demo = DemoPlayback::spatial(&TestProfile::for_patient("Test")).unwrap();
        let motors: Vec<_> = demo.stimuli().iter().map(|s| s.motors.clone()).collect();
        assert_eq!(motors, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
        assert!(demo.stimuli().iter().all(|s| s.intensity == 30));
    }

    #[test]
    fn test_level_demo_weakest_first() {
        let mut profile = TestProfile::for_patient("Test");
        profile.discrimination.levels = vec![60, 14];
        let demo = DemoPlayback::levels(&profile, &[2, 4]).unwrap();
        assert_eq!(
            demo.stimuli(),
            &[
                Stimulus::single(2, 14),
                Stimulus::single(2, 60),
                Stimulus::single(4, 14),
                Stimulus::single(4, 60),
            ]
        );
    }
}
