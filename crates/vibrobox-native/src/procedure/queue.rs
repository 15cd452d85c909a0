//! Resumable discrimination session
//!
//! A discrimination session may span several engine runs: the operator can
//! interrupt to retrain the patient, then resume with the motor that was in
//! progress, or re-run a motor that is already finished. The queue tracks
//! which motors have complete data and what to run next.

use std::collections::{BTreeMap, VecDeque};

use vibrobox_core::{AnalysisResult, DiscriminationResult, Intensity, MotorIndex, Trial};

use super::DiscriminationRun;

/// Motor bookkeeping for one discrimination session
#[derive(Clone, Debug, Default)]
pub struct DiscriminationQueue {
    motors: Vec<MotorIndex>,
    completed: BTreeMap<MotorIndex, Vec<Trial>>,
    pending: VecDeque<MotorIndex>,
    // Rewritten motor, run as a batch of its own before `pending`
    solo: Option<MotorIndex>,
}

impl DiscriminationQueue {
    /// New session over `motors`, all pending.
    #[must_use]
    pub fn new(motors: Vec<MotorIndex>) -> Self {
        let pending = motors.iter().copied().collect();
        Self {
            motors,
            completed: BTreeMap::new(),
            pending,
            solo: None,
        }
    }

    /// Motors selected for the session
    #[must_use]
    pub fn motors(&self) -> &[MotorIndex] {
        &self.motors
    }

    /// Motors with complete data, ascending
    #[must_use]
    pub fn completed_motors(&self) -> Vec<MotorIndex> {
        self.completed.keys().copied().collect()
    }

    /// Motors that still lack complete data, in session order
    #[must_use]
    pub fn unfinished(&self) -> Vec<MotorIndex> {
        self.motors
            .iter()
            .copied()
            .filter(|motor| !self.completed.contains_key(motor))
            .collect()
    }

    /// Take the next batch to run. Empty when nothing is queued.
    ///
    /// A rewritten motor always comes back alone; the motors queued behind it
    /// form the following batch.
    pub fn next_batch(&mut self) -> Vec<MotorIndex> {
        if let Some(motor) = self.solo.take() {
            return vec![motor];
        }
        self.pending.drain(..).collect()
    }

    /// Store a finished motor's trials, replacing any earlier data.
    ///
    /// Motors outside the session are ignored.
    pub fn record_motor(&mut self, motor: MotorIndex, trials: Vec<Trial>) {
        if !self.motors.contains(&motor) {
            tracing::warn!(motor, "Ignoring trials for a motor outside the session");
            return;
        }
        self.pending.retain(|&m| m != motor);
        if self.solo == Some(motor) {
            self.solo = None;
        }
        self.completed.insert(motor, trials);
    }

    /// Store every motor of an engine run.
    pub fn absorb(&mut self, run: DiscriminationRun) {
        for (motor, trials) in run.per_motor {
            self.record_motor(motor, trials);
        }
    }

    /// Schedule `motor` to be run again on its own.
    ///
    /// Its earlier data is discarded; the remaining unfinished motors stay
    /// queued after it. Returns `false` for a motor outside the session.
    pub fn rewrite(&mut self, motor: MotorIndex) -> bool {
        if !self.motors.contains(&motor) {
            return false;
        }
        if self.completed.remove(&motor).is_some() {
            tracing::info!(motor, "Discarding earlier discrimination data");
        }
        self.pending = self
            .unfinished()
            .into_iter()
            .filter(|&m| m != motor)
            .collect();
        self.solo = Some(motor);
        true
    }

    /// The run was stopped while `current` was in progress.
    ///
    /// Partial data for `current` is dropped and the session resumes with it,
    /// followed by the other unfinished motors.
    pub fn interrupt(&mut self, current: MotorIndex) {
        self.solo = None;
        if !self.motors.contains(&current) {
            self.pending = self.unfinished().into();
            return;
        }
        self.completed.remove(&current);
        self.requeue_first(current);
    }

    fn requeue_first(&mut self, motor: MotorIndex) {
        let mut pending: VecDeque<MotorIndex> = self
            .unfinished()
            .into_iter()
            .filter(|&m| m != motor)
            .collect();
        pending.push_front(motor);
        self.pending = pending;
    }

    /// Whether every motor has complete data
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.motors.iter().all(|m| self.completed.contains_key(m))
    }

    /// Aggregate what has been collected so far.
    ///
    /// # Errors
    ///
    /// Fails if a trial carries a level outside the schedule.
    pub fn finish(&self, pwm_values: Vec<Intensity>, repeats: usize) -> AnalysisResult<DiscriminationResult> {
        DiscriminationResult::build(&self.completed, &self.motors, pwm_values, repeats)
    }
}
