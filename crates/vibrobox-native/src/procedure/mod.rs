//! Procedure engines and their supervisor
//!
//! Each test runs as a tokio task that owns the motor array for its whole
//! lifetime. The control context talks to it through a [`RunHandle`]:
//! answers go in through a single-slot queue, progress comes out as
//! [`ProcedureEvent`]s, and the final [`RunOutcome`] arrives once.
//!
//! - [`threshold`]: Staircase threshold finding per motor
//! - [`spatial`]: Region localization
//! - [`discrimination`]: Intensity level discrimination per motor
//! - [`queue`]: Resumable motor queue for discrimination sessions
//! - [`demo`]: Training playback of regions and levels
//! - [`supervisor`]: Serialized start/stop of runs

pub mod channel;
pub mod demo;
pub mod discrimination;
pub mod queue;
pub mod spatial;
pub mod supervisor;
pub mod threshold;

mod session;

use serde::Serialize;
use vibrobox_core::{Intensity, MotorIndex, StaircaseDirection, StaircaseStep, Stimulus, Trial};

use crate::bridge::ActuationError;

pub use channel::{AnswerError, CancelSignal, Responder};
pub use demo::DemoPlayback;
pub use discrimination::{DiscriminationEngine, DiscriminationRun};
pub use queue::DiscriminationQueue;
pub use spatial::SpatialEngine;
pub use supervisor::{RunHandle, Supervisor, SupervisorError, SupervisorResult};
pub use threshold::ThresholdEngine;

// ============================================================================
// Engine State
// ============================================================================

/// Lifecycle of a procedure run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Not yet started
    Idle,
    /// A stimulus is being delivered
    Presenting,
    /// Waiting for the patient's answer
    AwaitingResponse,
    /// Recording an answer and choosing the next stimulus
    Evaluating,
    /// Finished normally
    Completed,
    /// Stopped early
    Cancelled,
}

impl EngineState {
    /// Whether the run is over
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Presenting => "presenting",
            Self::AwaitingResponse => "awaiting response",
            Self::Evaluating => "evaluating",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Position of a run within its schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Motor under test, for per-motor procedures
    pub motor: Option<MotorIndex>,
    /// Presentations (or passes) started so far, including the current one
    pub done: usize,
    /// Total in the current schedule
    pub total: usize,
    /// Staircase direction of the current pass
    pub direction: Option<StaircaseDirection>,
}

/// Observable run events, in the order they happen.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcedureEvent {
    /// Engine changed state
    StateChanged {
        /// New state
        state: EngineState,
    },
    /// Schedule position update
    Progress(Progress),
    /// A stimulus is about to be delivered
    Presenting {
        /// The stimulus
        stimulus: Stimulus,
    },
    /// The engine is now waiting for an answer
    AwaitingResponse,
    /// A staircase answer was recorded
    StaircaseStep(StaircaseStep),
    /// A staircase pass finished
    PassFinished {
        /// Motor under test
        motor: MotorIndex,
        /// Direction of the pass
        direction: StaircaseDirection,
        /// Threshold reported by the pass
        threshold: Intensity,
    },
    /// A categorical answer was recorded
    TrialRecorded(Trial),
    /// Every presentation for a motor has been answered
    MotorCompleted {
        /// The motor
        motor: MotorIndex,
        /// Its trials, in presentation order
        trials: Vec<Trial>,
    },
}

// ============================================================================
// Outcome
// ============================================================================

/// Why a run ended early
#[derive(Debug)]
pub enum CancelReason {
    /// The control context asked for it
    Requested,
    /// The motor array failed mid-run
    Hardware(ActuationError),
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("cancelled by operator"),
            Self::Hardware(e) => write!(f, "hardware failure: {e}"),
        }
    }
}

/// Terminal outcome of a run
#[derive(Debug)]
pub enum RunOutcome<T> {
    /// Every scheduled presentation was answered
    Completed(T),
    /// Stopped early. Only discrimination reports partial data, and only for
    /// motors it fully finished.
    Cancelled {
        /// Why the run stopped
        reason: CancelReason,
        /// Data from fully finished units, if the procedure keeps any
        partial: Option<T>,
    },
}

impl<T> RunOutcome<T> {
    /// Whether the run completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The result of a completed run
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whatever data the run produced, complete or partial
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Cancelled { partial, .. } => partial,
        }
    }
}
