//! Staircase threshold finding
//!
//! For every selected motor the engine runs `repeats` descending and
//! `repeats` ascending passes in random order. A pass walks its intensity
//! sequence one presentation at a time until the patient's answer flips
//! (felt → not felt going down, not felt → felt going up). The motor's
//! threshold is the rounded mean over its passes.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use vibrobox_core::sequencer::{mean_threshold, pass_order, PassStep, StaircasePass};
use vibrobox_core::{
    ConfigResult, Intensity, MotorIndex, StaircaseDirection, StaircaseStep, Stimulus,
    TestProfile, ThresholdConfig, ThresholdResult, TimingConfig,
};

use super::session::{Procedure, Session, Step};
use super::{Progress, ProcedureEvent, RunOutcome};

/// Threshold-finding engine
#[derive(Debug)]
pub struct ThresholdEngine {
    config: ThresholdConfig,
    motors: Vec<MotorIndex>,
    timing: TimingConfig,
    rng: StdRng,
}

impl ThresholdEngine {
    /// Engine for the profile's selected motors.
    ///
    /// # Errors
    ///
    /// Rejects an invalid motor range or staircase configuration.
    pub fn new(profile: &TestProfile) -> ConfigResult<Self> {
        profile.validate_threshold()?;
        let rng = profile
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            config: profile.threshold.clone(),
            motors: profile.selected_motors(),
            timing: profile.timing.clone(),
            rng,
        })
    }

    async fn execute(&mut self, session: &mut Session<bool>) -> Step<ThresholdResult> {
        let motors = self.motors.clone();
        let total = self.config.repeats * 2;
        let mut passes: BTreeMap<MotorIndex, Vec<Intensity>> = BTreeMap::new();

        for motor in motors {
            tracing::info!(motor, "Threshold search started");
            let order = pass_order(&mut self.rng, self.config.repeats);
            for (i, direction) in order.into_iter().enumerate() {
                session.check_cancelled()?;
                session.emit(ProcedureEvent::Progress(Progress {
                    motor: Some(motor),
                    done: i + 1,
                    total,
                    direction: Some(direction),
                }));

                let threshold = self.run_pass(session, motor, direction).await?;
                tracing::debug!(motor, %direction, threshold, "Pass finished");
                passes.entry(motor).or_default().push(threshold);
                session.emit(ProcedureEvent::PassFinished {
                    motor,
                    direction,
                    threshold,
                });

                session.indicator().await?;
                session.pause(self.timing.pass_pause()).await?;
            }
        }

        let thresholds = passes
            .into_iter()
            .filter_map(|(motor, results)| mean_threshold(&results).map(|t| (motor, t)))
            .collect();
        Ok(ThresholdResult { thresholds })
    }

    async fn run_pass(
        &mut self,
        session: &mut Session<bool>,
        motor: MotorIndex,
        direction: StaircaseDirection,
    ) -> Step<Intensity> {
        let mut pass = StaircasePass::generate(&mut self.rng, direction, &self.config);
        let mut step = pass.start();
        loop {
            let intensity = match step {
                PassStep::Done(threshold) => return Ok(threshold),
                PassStep::Next(intensity) => intensity,
            };

            session
                .present(
                    &Stimulus::single(motor, intensity),
                    self.timing.threshold_exposure(),
                )
                .await?;
            let felt = session.await_response(|_| true).await?;
            session.emit(ProcedureEvent::StaircaseStep(StaircaseStep {
                motor,
                direction,
                intensity,
                felt,
            }));

            step = pass.respond(felt);
            if matches!(step, PassStep::Next(_)) {
                session.pause(self.timing.step_pause()).await?;
            }
        }
    }
}

impl Procedure for ThresholdEngine {
    type Answer = bool;
    type Output = ThresholdResult;

    const NAME: &'static str = "threshold";

    async fn run(mut self, session: &mut Session<bool>) -> RunOutcome<ThresholdResult> {
        let result = self.execute(session).await;
        session.conclude(Self::NAME, result, || None)
    }
}

#[cfg(test)]
mod tests {
    use vibrobox_core::MotorRange;

    use super::*;

    #[test]
    fn test_rejects_invalid_profile() {
        let mut profile = TestProfile::for_patient("Test");
        profile.threshold.repeats = 0;
        assert!(ThresholdEngine::new(&profile).is_err());

        let mut profile = TestProfile::for_patient("Test");
        profile.motors = MotorRange {
            start: 0,
            end: 20,
            step: 1,
        };
        assert!(ThresholdEngine::new(&profile).is_err());
    }

    #[test]
    fn test_selected_motors() {
        let engine = ThresholdEngine::new(&TestProfile::for_patient("Test")).unwrap();
        assert_eq!(engine.motors, vec![0, 2, 4]);
    }
}
