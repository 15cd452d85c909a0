//! VibroBox Native - motor array bridges and procedure engines
//!
//! This crate drives the vibration-motor array and runs the three tactile
//! procedures against it:
//! - Threshold finding (up/down staircase per motor)
//! - Spatial localization (region naming)
//! - Intensity discrimination (level naming per motor)
//!
//! # Modules
//!
//! - [`bridge`]: Actuation port contract, USB serial and simulated arrays
//! - [`procedure`]: Engines, run handles and the supervisor
//!
//! # Example
//!
//! ```rust,ignore
//! use vibrobox_core::TestProfile;
//! use vibrobox_native::{ProcedureEvent, SimulatedPort, Supervisor};
//!
//! let mut supervisor = Supervisor::new(SimulatedPort::new(10));
//! let profile = TestProfile::for_patient("Ivanov");
//!
//! let mut run = supervisor.start_threshold(&profile).await?;
//! while let Some(event) = run.next_event().await {
//!     if event == ProcedureEvent::AwaitingResponse {
//!         run.set_answer(ask_patient())?;
//!     }
//! }
//! let thresholds = run.outcome().await?.completed();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod procedure;

// Re-export key types
pub use bridge::{begin_end_indicator, ActuationError, ActuationPort, ActuationResult, SimulatedPort};

#[cfg(feature = "usb")]
pub use bridge::{PortSummary, SerialActuator};

pub use procedure::{
    AnswerError, CancelReason, CancelSignal, DemoPlayback, DiscriminationQueue, DiscriminationRun,
    EngineState, ProcedureEvent, Progress, Responder, RunHandle, RunOutcome, Supervisor,
    SupervisorError, SupervisorResult,
};
