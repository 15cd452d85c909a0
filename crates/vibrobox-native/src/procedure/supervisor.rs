//! Run supervisor
//!
//! Owns the motor array while idle and lends it to exactly one run task at a
//! time. Starting a run always stops and joins the previous one first, so two
//! runs never drive the hardware concurrently.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use vibrobox_core::{
    Category, ConfigError, MotorIndex, SpatialResult, TestProfile, ThresholdResult,
};

use super::channel::{cancel_signal, response_slot, AnswerError, CancelSignal, Responder};
use super::session::{Procedure, Session};
use super::{
    DemoPlayback, DiscriminationEngine, DiscriminationRun, ProcedureEvent, RunOutcome,
    SpatialEngine, ThresholdEngine,
};
use crate::bridge::{begin_end_indicator, ActuationError, ActuationPort};

/// Bounded wait for a cancelled run to hand the port back
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Errors
// ============================================================================

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Profile rejected before touching hardware
    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// No motor array attached (or it was lost with an aborted run)
    #[error("Hardware unavailable: no motor array attached")]
    HardwareUnavailable,

    /// Profile and attached array disagree on motor count
    #[error("Profile expects {profile} motors but the array has {port}")]
    MotorCountMismatch {
        /// Motor count in the profile
        profile: usize,
        /// Motor count of the attached array
        port: usize,
    },

    /// The motor array failed outside a run
    #[error("Hardware error: {0}")]
    Hardware(#[from] ActuationError),

    /// The previous run did not stop within the bounded wait
    #[error("Previous {0} run did not stop in time and was aborted")]
    StopTimeout(&'static str),

    /// The run task panicked
    #[error("Run task failed: {0}")]
    RunPanicked(String),

    /// The run ended without reporting an outcome
    #[error("Run was aborted before reporting an outcome")]
    RunAborted,
}

/// Result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;

// ============================================================================
// Run Handle
// ============================================================================

/// Control-side handle to a running procedure
///
/// `A` is the answer type, `T` the result type.
#[derive(Debug)]
pub struct RunHandle<A, T> {
    responder: Responder<A>,
    cancel: CancelSignal,
    events: mpsc::UnboundedReceiver<ProcedureEvent>,
    outcome: oneshot::Receiver<RunOutcome<T>>,
}

impl<A, T> RunHandle<A, T> {
    /// Answer the current presentation.
    ///
    /// # Errors
    ///
    /// See [`Responder::set_answer`].
    pub fn set_answer(&self, answer: A) -> Result<(), AnswerError> {
        self.responder.set_answer(answer)
    }

    /// A clonable answer sender
    #[must_use]
    pub fn responder(&self) -> Responder<A> {
        self.responder.clone()
    }

    /// Ask the run to stop. Motors are zeroed and the outcome is `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clonable cancellation switch
    #[must_use]
    pub fn canceller(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Next event; `None` once the run has finished and all events are read.
    pub async fn next_event(&mut self) -> Option<ProcedureEvent> {
        self.events.recv().await
    }

    /// Wait for the terminal outcome.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::RunAborted`] if the task was aborted or panicked.
    pub async fn outcome(self) -> SupervisorResult<RunOutcome<T>> {
        self.outcome.await.map_err(|_| SupervisorError::RunAborted)
    }
}

// ============================================================================
// Supervisor
// ============================================================================

struct ActiveRun {
    name: &'static str,
    cancel: CancelSignal,
    join: JoinHandle<Box<dyn ActuationPort>>,
}

/// Serializes access to the motor array
pub struct Supervisor {
    port: Option<Box<dyn ActuationPort>>,
    active: Option<ActiveRun>,
    stop_timeout: Duration,
}

impl Supervisor {
    /// Supervisor owning `port`
    #[must_use]
    pub fn new(port: impl ActuationPort + 'static) -> Self {
        Self {
            port: Some(Box::new(port)),
            active: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Supervisor without hardware; every start fails until [`Self::attach`].
    #[must_use]
    pub fn detached() -> Self {
        Self {
            port: None,
            active: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override the bounded stop wait
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Replace the motor array, stopping any active run first.
    ///
    /// # Errors
    ///
    /// Propagates a failed stop; the new port is attached regardless.
    pub async fn attach(&mut self, port: impl ActuationPort + 'static) -> SupervisorResult<()> {
        let stopped = self.stop().await;
        self.port = Some(Box::new(port));
        stopped
    }

    /// Whether a motor array is available (idle or lent to a run)
    #[must_use]
    pub fn has_hardware(&self) -> bool {
        self.port.is_some() || self.active.is_some()
    }

    /// Whether a run task is still executing
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.join.is_finished())
    }

    /// Cancel the active run (if any) and take the port back.
    ///
    /// Also used to reclaim the port after a run finished on its own.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::StopTimeout`] when the task does not finish within
    /// the bounded wait; it is aborted and the port is lost.
    /// [`SupervisorError::RunPanicked`] when the task panicked.
    pub async fn stop(&mut self) -> SupervisorResult<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        active.cancel.cancel();

        match tokio::time::timeout(self.stop_timeout, &mut active.join).await {
            Ok(Ok(port)) => {
                tracing::debug!(procedure = active.name, "Run joined, port reclaimed");
                self.port = Some(port);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(procedure = active.name, error = %e, "Run task failed");
                Err(SupervisorError::RunPanicked(e.to_string()))
            }
            Err(_) => {
                tracing::error!(procedure = active.name, "Run did not stop in time, aborting");
                active.join.abort();
                Err(SupervisorError::StopTimeout(active.name))
            }
        }
    }

    /// Blink the whole array to tell the patient a test is about to start.
    ///
    /// # Errors
    ///
    /// Stop or hardware failures.
    pub async fn begin_indicator(&mut self, profile: &TestProfile) -> SupervisorResult<()> {
        self.stop().await?;
        let port = self
            .port
            .as_mut()
            .ok_or(SupervisorError::HardwareUnavailable)?;
        begin_end_indicator(&mut **port, &profile.indicator).await?;
        Ok(())
    }

    /// Start the threshold test on the profile's motors.
    ///
    /// # Errors
    ///
    /// Configuration, hardware or stop failures; nothing is actuated then.
    pub async fn start_threshold(
        &mut self,
        profile: &TestProfile,
    ) -> SupervisorResult<RunHandle<bool, ThresholdResult>> {
        let engine = ThresholdEngine::new(profile)?;
        self.launch(engine, profile).await
    }

    /// Start the spatial test.
    ///
    /// # Errors
    ///
    /// Configuration, hardware or stop failures; nothing is actuated then.
    pub async fn start_spatial(
        &mut self,
        profile: &TestProfile,
    ) -> SupervisorResult<RunHandle<Category, SpatialResult>> {
        let engine = SpatialEngine::new(profile)?;
        self.launch(engine, profile).await
    }

    /// Start the discrimination test on a batch of motors.
    ///
    /// # Errors
    ///
    /// Configuration, hardware or stop failures; nothing is actuated then.
    pub async fn start_discrimination(
        &mut self,
        profile: &TestProfile,
        motors: &[MotorIndex],
    ) -> SupervisorResult<RunHandle<Category, DiscriminationRun>> {
        let engine = DiscriminationEngine::new(profile, motors)?;
        self.launch(engine, profile).await
    }

    /// Play a training demo. The handle accepts no meaningful answers.
    ///
    /// # Errors
    ///
    /// Hardware or stop failures.
    pub async fn start_demo(
        &mut self,
        demo: DemoPlayback,
        profile: &TestProfile,
    ) -> SupervisorResult<RunHandle<(), usize>> {
        self.launch(demo, profile).await
    }

    async fn launch<P: Procedure>(
        &mut self,
        procedure: P,
        profile: &TestProfile,
    ) -> SupervisorResult<RunHandle<P::Answer, P::Output>> {
        self.stop().await?;
        let port = self.port.take().ok_or(SupervisorError::HardwareUnavailable)?;
        if port.motor_count() != profile.motor_count {
            let mismatch = SupervisorError::MotorCountMismatch {
                profile: profile.motor_count,
                port: port.motor_count(),
            };
            self.port = Some(port);
            return Err(mismatch);
        }

        let (responder, slot) = response_slot();
        let (cancel, listener) = cancel_signal();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let mut session = Session::new(port, slot, listener, event_tx, profile.indicator.clone());

        tracing::info!(procedure = P::NAME, "Starting run");
        let join = tokio::spawn(async move {
            let outcome = procedure.run(&mut session).await;
            // Receiver may already be gone
            let _ = outcome_tx.send(outcome);
            session.into_port()
        });

        self.active = Some(ActiveRun {
            name: P::NAME,
            cancel: cancel.clone(),
            join,
        });

        Ok(RunHandle {
            responder,
            cancel,
            events: event_rx,
            outcome: outcome_rx,
        })
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("has_port", &self.port.is_some())
            .field("active", &self.active.as_ref().map(|a| a.name))
            .field("stop_timeout", &self.stop_timeout)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vibrobox_core::{IndicatorConfig, MotorRange, Stimulus, TimingConfig};

    use super::*;
    use crate::bridge::SimulatedPort;
    use crate::procedure::{CancelReason, EngineState};

    const LIMIT: Duration = Duration::from_secs(5);

    fn fast_profile() -> TestProfile {
        let mut profile = TestProfile::for_patient("Test");
        profile.timing = TimingConfig::uniform(1);
        profile.indicator = IndicatorConfig {
            intensity: 20,
            repeats: 2,
            pause_ms: 1,
        };
        profile.seed = Some(7);
        profile
    }

    /// Frames with every motor at the indicator intensity.
    fn indicator_frames(port: &SimulatedPort, profile: &TestProfile) -> usize {
        port.frames()
            .iter()
            .filter(|frame| frame.iter().all(|&v| v == profile.indicator.intensity))
            .count()
    }

    /// Answer every prompt with `answer(last presented stimulus)`.
    async fn drive<A, T>(
        handle: &mut RunHandle<A, T>,
        mut answer: impl FnMut(&Stimulus) -> A,
    ) -> Vec<ProcedureEvent> {
        let mut events = Vec::new();
        let mut last = None;
        while let Some(event) = handle.next_event().await {
            match &event {
                ProcedureEvent::Presenting { stimulus } => last = Some(stimulus.clone()),
                ProcedureEvent::AwaitingResponse => {
                    if let Some(stimulus) = &last {
                        handle.set_answer(answer(stimulus)).unwrap();
                    }
                }
                _ => {}
            }
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_threshold_run_completes() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.motors = MotorRange {
            start: 3,
            end: 3,
            step: 1,
        };
        profile.threshold.repeats = 1;

        let mut handle = supervisor.start_threshold(&profile).await.unwrap();
        // Felt at 20 and above.
        let events = tokio::time::timeout(LIMIT, drive(&mut handle, |s| s.intensity >= 20))
            .await
            .unwrap();
        let outcome = handle.outcome().await.unwrap();

        let result = outcome.completed().unwrap();
        // Descending stops at 18 → 18 + 5 = 23. Ascending stops at the first
        // value ≥ 20, which is 20 or 21 depending on the start parity.
        // Either way the rounded mean is 22.
        assert_eq!(result.threshold(3), Some(22));

        let passes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProcedureEvent::PassFinished { threshold, .. } => Some(*threshold),
                _ => None,
            })
            .collect();
        assert_eq!(passes.len(), 2);
        assert!(passes.contains(&23));
        assert!(passes.iter().any(|&t| t == 20 || t == 21));
        // One blink after each pass, the last one closing the test.
        assert_eq!(indicator_frames(&probe, &profile), 2 * 2);
        assert!(probe.is_idle());

        supervisor.stop().await.unwrap();
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let profile = fast_profile();

        let mut handle = supervisor.start_spatial(&profile).await.unwrap();
        let mut trials = 0;
        loop {
            let event = tokio::time::timeout(LIMIT, handle.next_event())
                .await
                .unwrap();
            match event {
                Some(ProcedureEvent::AwaitingResponse) => {
                    handle.cancel();
                    break;
                }
                Some(ProcedureEvent::TrialRecorded(_)) => trials += 1,
                Some(_) => {}
                None => panic!("run ended before prompting"),
            }
        }

        let mut last_state = None;
        while let Some(event) = tokio::time::timeout(LIMIT, handle.next_event())
            .await
            .unwrap()
        {
            match event {
                ProcedureEvent::TrialRecorded(_) => trials += 1,
                ProcedureEvent::StateChanged { state } => last_state = Some(state),
                _ => {}
            }
        }
        let outcome = handle.outcome().await.unwrap();

        assert_eq!(trials, 0);
        assert_eq!(last_state, Some(EngineState::Cancelled));
        assert!(matches!(
            outcome,
            RunOutcome::Cancelled {
                reason: CancelReason::Requested,
                partial: None
            }
        ));
        assert_eq!(probe.last_frame(), Some(vec![0; 10]));
        assert_eq!(indicator_frames(&probe, &profile), 0);

        // The port came back: another run can start.
        supervisor.stop().await.unwrap();
        let handle = supervisor.start_spatial(&profile).await.unwrap();
        handle.cancel();
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_spatial_run_completes() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.spatial.samples = 7;

        let mut handle = supervisor.start_spatial(&profile).await.unwrap();
        // Regions start at motors 0, 2 and 4.
        let region = |s: &Stimulus| -> Category { Category::try_from(s.motors[0] / 2 + 1).unwrap() };
        let events = tokio::time::timeout(LIMIT, drive(&mut handle, region))
            .await
            .unwrap();
        let result = handle.outcome().await.unwrap().completed().unwrap();

        assert_eq!(result.answers.len(), 7);
        assert!(result.answers.iter().all(|(truth, seen)| truth == seen));
        assert!(result.answers.iter().all(|(truth, _)| (1..=3).contains(truth)));
        // Every region shown twice, one extra drawn without replacement.
        for r in 1..=3 {
            let shown = result.answers.iter().filter(|(t, _)| *t == r).count();
            assert!(shown == 2 || shown == 3, "region {r} shown {shown} times");
        }
        let recorded = events
            .iter()
            .filter(|e| matches!(e, ProcedureEvent::TrialRecorded(_)))
            .count();
        assert_eq!(recorded, 7);
        assert_eq!(indicator_frames(&probe, &profile), 2);
        assert!(probe.is_idle());

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_discrimination_end_to_end() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.discrimination.levels = vec![20, 60];
        profile.discrimination.repeats = 2;
        let levels = profile.discrimination.sorted_levels();

        let mut handle = supervisor.start_discrimination(&profile, &[0]).await.unwrap();
        // Right on the first showing of each level, wrong on the second.
        let mut seen: HashMap<u8, usize> = HashMap::new();
        let events = tokio::time::timeout(
            LIMIT,
            drive(&mut handle, |stimulus| {
                let level: Category = if stimulus.intensity == 20 { 1 } else { 2 };
                let count = seen.entry(stimulus.intensity).or_default();
                *count += 1;
                if *count == 1 {
                    level
                } else {
                    3 - level
                }
            }),
        )
        .await
        .unwrap();
        let run = handle.outcome().await.unwrap().completed().unwrap();

        assert!(events
            .iter()
            .any(|e| matches!(e, ProcedureEvent::MotorCompleted { motor: 0, .. })));
        assert_eq!(run.per_motor[&0].len(), 4);

        let mut queue = crate::procedure::DiscriminationQueue::new(vec![0]);
        queue.absorb(run);
        assert!(queue.is_complete());
        let result = queue.finish(levels, 2).unwrap();
        assert_eq!(result.confusion.counts(), &[vec![1, 1], vec![1, 1]]);
        assert_eq!(result.mean_accuracy, 0.5);
        assert_eq!(indicator_frames(&probe, &profile), 2);

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_discrimination_rewrite_keeps_other_motors() {
        let port = SimulatedPort::new(10);
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.discrimination.levels = vec![20, 60];
        profile.discrimination.repeats = 1;
        let levels = profile.discrimination.sorted_levels();
        let correct = |s: &Stimulus| -> Category { if s.intensity == 20 { 1 } else { 2 } };

        let mut queue = crate::procedure::DiscriminationQueue::new(vec![0, 2]);
        let batch = queue.next_batch();
        let mut handle = supervisor.start_discrimination(&profile, &batch).await.unwrap();
        // Motor 0 always answered "1", motor 2 answered correctly.
        tokio::time::timeout(
            LIMIT,
            drive(&mut handle, |s| if s.motors == [0] { 1 } else { correct(s) }),
        )
        .await
        .unwrap();
        queue.absorb(handle.outcome().await.unwrap().completed().unwrap());
        let before = queue.finish(levels.clone(), 1).unwrap();
        assert_eq!(before.per_motor_accuracy[&0], 0.5);
        assert_eq!(before.per_motor_accuracy[&2], 1.0);

        assert!(queue.rewrite(0));
        let batch = queue.next_batch();
        assert_eq!(batch, vec![0]);
        let mut handle = supervisor.start_discrimination(&profile, &batch).await.unwrap();
        tokio::time::timeout(LIMIT, drive(&mut handle, correct))
            .await
            .unwrap();
        queue.absorb(handle.outcome().await.unwrap().completed().unwrap());

        let after = queue.finish(levels, 1).unwrap();
        assert_eq!(after.per_motor_accuracy[&0], 1.0);
        assert_eq!(after.per_motor_accuracy[&2], 1.0);
        assert_eq!(after.confusion_per_motor[&2], before.confusion_per_motor[&2]);
        assert_eq!(after.answers.len(), 4);

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_discrimination_keeps_finished_motors() {
        let port = SimulatedPort::new(10);
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.discrimination.levels = vec![20, 60];
        profile.discrimination.repeats = 1;

        let mut handle = supervisor
            .start_discrimination(&profile, &[0, 2])
            .await
            .unwrap();
        let mut current = None;
        while let Some(event) = tokio::time::timeout(LIMIT, handle.next_event())
            .await
            .unwrap()
        {
            match event {
                ProcedureEvent::Progress(progress) => current = progress.motor,
                ProcedureEvent::AwaitingResponse if current == Some(2) => handle.cancel(),
                ProcedureEvent::AwaitingResponse => handle.set_answer(1).unwrap(),
                _ => {}
            }
        }

        match handle.outcome().await.unwrap() {
            RunOutcome::Cancelled {
                reason: CancelReason::Requested,
                partial: Some(run),
            } => {
                assert_eq!(run.per_motor.keys().copied().collect::<Vec<_>>(), vec![0]);
                let mut queue = crate::procedure::DiscriminationQueue::new(vec![0, 2]);
                queue.next_batch();
                queue.absorb(run);
                queue.interrupt(2);
                assert_eq!(queue.next_batch(), vec![2]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_hardware_failure_cancels_run() {
        let port = SimulatedPort::new(10);
        port.fail_after(3);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let profile = fast_profile();

        let mut handle = supervisor.start_threshold(&profile).await.unwrap();
        tokio::time::timeout(LIMIT, drive(&mut handle, |_| true))
            .await
            .unwrap();
        let outcome = handle.outcome().await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::Cancelled {
                reason: CancelReason::Hardware(ActuationError::NotConnected),
                partial: None
            }
        ));
        assert!(!probe.is_connected());
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_replaces_active_run() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let profile = fast_profile();

        let mut first = supervisor.start_spatial(&profile).await.unwrap();
        while let Some(event) = first.next_event().await {
            if event == ProcedureEvent::AwaitingResponse {
                break;
            }
        }
        assert!(supervisor.is_running());

        let second = supervisor.start_threshold(&profile).await.unwrap();
        assert!(matches!(
            first.outcome().await.unwrap(),
            RunOutcome::Cancelled {
                reason: CancelReason::Requested,
                ..
            }
        ));
        second.cancel();
        supervisor.stop().await.unwrap();
        assert!(probe.is_idle());
    }

    #[tokio::test]
    async fn test_invalid_profile_never_actuates() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.spatial.samples = 0;

        assert!(matches!(
            supervisor.start_spatial(&profile).await,
            Err(SupervisorError::Config(_))
        ));
        assert!(probe.frames().is_empty());
    }

    #[tokio::test]
    async fn test_detached_and_mismatched_hardware() {
        let mut supervisor = Supervisor::detached();
        let profile = fast_profile();
        assert!(matches!(
            supervisor.start_threshold(&profile).await,
            Err(SupervisorError::HardwareUnavailable)
        ));

        supervisor.attach(SimulatedPort::new(6)).await.unwrap();
        assert!(matches!(
            supervisor.start_threshold(&profile).await,
            Err(SupervisorError::MotorCountMismatch {
                profile: 10,
                port: 6
            })
        ));
        assert!(supervisor.has_hardware());
    }

    #[tokio::test]
    async fn test_begin_indicator_blinks_all_motors() {
        let port = SimulatedPort::new(4);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let mut profile = fast_profile();
        profile.motor_count = 4;

        supervisor.begin_indicator(&profile).await.unwrap();
        assert_eq!(
            probe.frames(),
            vec![vec![20; 4], vec![0; 4], vec![20; 4], vec![0; 4]]
        );

        probe.disconnect();
        assert!(matches!(
            supervisor.begin_indicator(&profile).await,
            Err(SupervisorError::Hardware(ActuationError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_demo_plays_every_region() {
        let port = SimulatedPort::new(10);
        let probe = port.clone();
        let mut supervisor = Supervisor::new(port);
        let profile = fast_profile();

        let demo = DemoPlayback::spatial(&profile).unwrap();
        let handle = supervisor.start_demo(demo, &profile).await.unwrap();
        let played = tokio::time::timeout(LIMIT, handle.outcome())
            .await
            .unwrap()
            .unwrap()
            .completed();
        assert_eq!(played, Some(3));

        // Six motor pulses, each followed by a reset.
        let pulses = probe
            .frames()
            .iter()
            .filter(|frame| frame.iter().any(|&v| v > 0))
            .count();
        assert_eq!(pulses, 6);
        assert!(probe.is_idle());
        supervisor.stop().await.unwrap();
    }
}
