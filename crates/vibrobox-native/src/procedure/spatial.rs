//! Spatial localization
//!
//! Regions are pulsed in a balanced random order and the patient names the
//! region they felt. Answers are accepted only within `1..=region count`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use vibrobox_core::sequencer::{spatial_regions, spatial_schedule};
use vibrobox_core::{
    Category, ConfigResult, Region, SpatialConfig, SpatialResult, TestProfile, TimingConfig,
    Trial,
};

use super::session::{Procedure, Session, Step};
use super::{Progress, ProcedureEvent, RunOutcome};

/// Spatial-localization engine
#[derive(Debug)]
pub struct SpatialEngine {
    config: SpatialConfig,
    regions: Vec<Region>,
    timing: TimingConfig,
    rng: StdRng,
}

impl SpatialEngine {
    /// Engine over the profile's motor range.
    ///
    /// # Errors
    ///
    /// Rejects an invalid range, zero samples, or a range that yields no
    /// regions in the chosen mode.
    pub fn new(profile: &TestProfile) -> ConfigResult<Self> {
        profile.validate_spatial()?;
        let rng = profile
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            config: profile.spatial.clone(),
            regions: spatial_regions(&profile.motors, profile.spatial.mode),
            timing: profile.timing.clone(),
            rng,
        })
    }

    /// Regions the patient chooses from
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    async fn execute(&mut self, session: &mut Session<Category>) -> Step<SpatialResult> {
        let schedule = spatial_schedule(&mut self.rng, &self.regions, self.config.samples);
        let region_count = Category::try_from(self.regions.len()).unwrap_or(Category::MAX);
        let total = schedule.len();
        let mut answers = Vec::with_capacity(total);
        tracing::info!(regions = region_count, samples = total, mode = %self.config.mode, "Spatial test started");

        for (order, region) in schedule.into_iter().enumerate() {
            session.check_cancelled()?;
            session.emit(ProcedureEvent::Progress(Progress {
                motor: None,
                done: order + 1,
                total,
                direction: None,
            }));

            let stimulus = region.stimulus(self.config.intensity);
            session.present(&stimulus, self.timing.exposure()).await?;
            let observed = session
                .await_response(|answer| (1..=region_count).contains(answer))
                .await?;

            let trial = Trial {
                order,
                stimulus,
                expected: region.index,
                observed,
            };
            tracing::debug!(expected = trial.expected, observed, "Spatial answer");
            answers.push(trial.pair());
            session.emit(ProcedureEvent::TrialRecorded(trial));
            session.pause(self.timing.spatial_pause()).await?;
        }

        session.indicator().await?;
        Ok(SpatialResult {
            answers,
            mode: self.config.mode,
        })
    }
}

impl Procedure for SpatialEngine {
    type Answer = Category;
    type Output = SpatialResult;

    const NAME: &'static str = "spatial";

    async fn run(mut self, session: &mut Session<Category>) -> RunOutcome<SpatialResult> {
        let result = self.execute(session).await;
        session.conclude(Self::NAME, result, || None)
    }
}

#[cfg(test)]
mod tests {
    use vibrobox_core::{MotorRange, SamplingMode};

    use super::*;

    #[test]
    fn test_pairs_regions() {
        let engine = SpatialEngine::new(&TestProfile::for_patient("Test")).unwrap();
        let motors: Vec<_> = engine.regions().iter().map(|r| r.motors.clone()).collect();
        assert_eq!(motors, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_empty_region_pool_rejected() {
        let mut profile = TestProfile::for_patient("Test");
        profile.motors = MotorRange {
            start: 3,
            end: 4,
            step: 2,
        };
        profile.spatial.mode = SamplingMode::Pairs;
        assert!(SpatialEngine::new(&profile).is_ok());

        profile.motors.end = 3;
        assert!(SpatialEngine::new(&profile).is_err());
    }
}
