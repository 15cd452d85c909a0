//! Intensity discrimination
//!
//! For each motor in the batch every level is presented `repeats` times in
//! shuffled order and the patient names the level (1 = weakest). A motor's
//! trials are reported only once all of them are answered; a cancelled run
//! hands back the motors it finished and nothing of the motor in progress.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use vibrobox_core::sequencer::discrimination_schedule;
use vibrobox_core::{
    Category, ConfigError, ConfigResult, DiscriminationConfig, Intensity, MotorIndex, Stimulus,
    TestProfile, TimingConfig, Trial,
};

use super::session::{Procedure, Session, Step};
use super::{Progress, ProcedureEvent, RunOutcome};

/// Trials per fully finished motor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminationRun {
    /// Motor → trials in presentation order
    pub per_motor: BTreeMap<MotorIndex, Vec<Trial>>,
}

/// Discrimination engine over a batch of motors
#[derive(Debug)]
pub struct DiscriminationEngine {
    config: DiscriminationConfig,
    motors: Vec<MotorIndex>,
    timing: TimingConfig,
    rng: StdRng,
}

impl DiscriminationEngine {
    /// Engine for an explicit motor batch.
    ///
    /// # Errors
    ///
    /// Rejects an invalid schedule or a motor outside the array.
    pub fn new(profile: &TestProfile, motors: &[MotorIndex]) -> ConfigResult<Self> {
        profile.validate_discrimination()?;
        if let Some(&motor) = motors.iter().find(|&&m| m >= profile.motor_count) {
            return Err(ConfigError::MotorOutOfRange {
                motor,
                motor_count: profile.motor_count,
            });
        }
        let rng = profile
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            config: profile.discrimination.clone(),
            motors: motors.to_vec(),
            timing: profile.timing.clone(),
            rng,
        })
    }

    /// Level intensities, ascending
    #[must_use]
    pub fn pwm_values(&self) -> Vec<Intensity> {
        self.config.sorted_levels()
    }

    async fn execute(
        &mut self,
        session: &mut Session<Category>,
        finished: &mut BTreeMap<MotorIndex, Vec<Trial>>,
    ) -> Step<()> {
        let motors = self.motors.clone();
        let level_count = Category::try_from(self.config.levels.len()).unwrap_or(Category::MAX);

        for motor in motors {
            let schedule =
                discrimination_schedule(&mut self.rng, &self.config.levels, self.config.repeats);
            let total = schedule.len();
            let mut trials = Vec::with_capacity(total);
            tracing::info!(motor, presentations = total, "Discrimination started");

            for (order, presentation) in schedule.into_iter().enumerate() {
                session.check_cancelled()?;
                session.emit(ProcedureEvent::Progress(Progress {
                    motor: Some(motor),
                    done: order + 1,
                    total,
                    direction: None,
                }));

                let stimulus = Stimulus::single(motor, presentation.intensity);
                session.present(&stimulus, self.timing.exposure()).await?;
                let observed = session
                    .await_response(|answer| (1..=level_count).contains(answer))
                    .await?;

                let trial = Trial {
                    order,
                    stimulus,
                    expected: presentation.level,
                    observed,
                };
                trials.push(trial.clone());
                session.emit(ProcedureEvent::TrialRecorded(trial));

                if order + 1 < total {
                    session.pause(self.timing.step_pause()).await?;
                }
            }

            let correct = trials.iter().filter(|t| t.is_correct()).count();
            tracing::info!(motor, correct, total, "Discrimination finished for motor");
            finished.insert(motor, trials.clone());
            session.emit(ProcedureEvent::MotorCompleted { motor, trials });
        }

        session.indicator().await
    }
}

impl Procedure for DiscriminationEngine {
    type Answer = Category;
    type Output = DiscriminationRun;

    const NAME: &'static str = "discrimination";

    async fn run(mut self, session: &mut Session<Category>) -> RunOutcome<DiscriminationRun> {
        let mut finished = BTreeMap::new();
        let result = self.execute(session, &mut finished).await;
        let partial = DiscriminationRun {
            per_motor: finished,
        };
        match result {
            Ok(()) => session.conclude(Self::NAME, Ok(partial), || None),
            Err(interrupt) => session.conclude(Self::NAME, Err(interrupt), || Some(partial)),
        }
    }
}
