//! Engine-side run context
//!
//! Owns the motor array for the duration of a run and provides the three
//! suspension points every engine is built from: presenting a stimulus,
//! waiting for an answer, and pausing. Each of them is raced against the
//! cancellation flag.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use vibrobox_core::{IndicatorConfig, Stimulus};

use super::channel::{CancelListener, ResponseSlot};
use super::{CancelReason, EngineState, ProcedureEvent, RunOutcome};
use crate::bridge::{ActuationError, ActuationPort};

/// Why an engine stopped before finishing its schedule
#[derive(Debug)]
pub(crate) enum Interrupt {
    Cancelled,
    Hardware(ActuationError),
}

impl From<ActuationError> for Interrupt {
    fn from(e: ActuationError) -> Self {
        Self::Hardware(e)
    }
}

pub(crate) type Step<T> = Result<T, Interrupt>;

/// A procedure that can be launched by the supervisor
pub(crate) trait Procedure: Send + 'static {
    /// Answer type accepted while waiting
    type Answer: Debug + Send + 'static;
    /// Result of a completed run
    type Output: Send + 'static;

    /// Short name for logs
    const NAME: &'static str;

    fn run(
        self,
        session: &mut Session<Self::Answer>,
    ) -> impl Future<Output = RunOutcome<Self::Output>> + Send;
}

pub(crate) struct Session<A> {
    port: Box<dyn ActuationPort>,
    responses: ResponseSlot<A>,
    cancel: CancelListener,
    events: mpsc::UnboundedSender<ProcedureEvent>,
    indicator: IndicatorConfig,
    state: EngineState,
}

impl<A: Debug + Send> Session<A> {
    pub(crate) fn new(
        port: Box<dyn ActuationPort>,
        responses: ResponseSlot<A>,
        cancel: CancelListener,
        events: mpsc::UnboundedSender<ProcedureEvent>,
        indicator: IndicatorConfig,
    ) -> Self {
        Self {
            port,
            responses,
            cancel,
            events,
            indicator,
            state: EngineState::Idle,
        }
    }

    /// Hand the motor array back.
    pub(crate) fn into_port(self) -> Box<dyn ActuationPort> {
        self.port
    }

    pub(crate) fn emit(&self, event: ProcedureEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            tracing::trace!(from = %self.state, to = %state, "Engine state");
            self.state = state;
            self.emit(ProcedureEvent::StateChanged { state });
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> EngineState {
        self.state
    }

    pub(crate) fn check_cancelled(&self) -> Step<()> {
        if self.cancel.is_cancelled() {
            Err(Interrupt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep unless cancelled first. Returns `true` when interrupted.
    async fn sleep_or_cancel(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(duration) => false,
        }
    }

    /// Deliver a stimulus: each target motor in turn for `exposure`, then
    /// every motor off. Motors are zeroed even when cancelled mid-exposure.
    pub(crate) async fn present(&mut self, stimulus: &Stimulus, exposure: Duration) -> Step<()> {
        self.check_cancelled()?;
        self.set_state(EngineState::Presenting);
        self.emit(ProcedureEvent::Presenting {
            stimulus: stimulus.clone(),
        });

        let motor_count = self.port.motor_count();
        for frame in stimulus.frames(motor_count) {
            if let Err(e) = self.port.set_intensities(&frame) {
                self.force_zero();
                return Err(e.into());
            }
            let interrupted = self.sleep_or_cancel(exposure).await;
            self.port.reset()?;
            if interrupted {
                return Err(Interrupt::Cancelled);
            }
        }
        self.check_cancelled()
    }

    /// Wait for an answer accepted by `accept`.
    ///
    /// Stale answers queued before the wait are discarded. Rejected answers
    /// are logged and the wait continues.
    pub(crate) async fn await_response(&mut self, accept: impl Fn(&A) -> bool) -> Step<A> {
        self.check_cancelled()?;
        let stale = self.responses.clear();
        if stale > 0 {
            tracing::debug!(stale, "Discarded answers given before the prompt");
        }
        self.set_state(EngineState::AwaitingResponse);
        self.emit(ProcedureEvent::AwaitingResponse);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Interrupt::Cancelled),
                answer = self.responses.recv() => match answer {
                    Some(answer) if accept(&answer) => {
                        self.set_state(EngineState::Evaluating);
                        return Ok(answer);
                    }
                    Some(answer) => {
                        tracing::warn!(?answer, "Ignoring out-of-range answer");
                    }
                    None => return Err(Interrupt::Cancelled),
                },
            }
        }
    }

    /// Idle pause between presentations.
    pub(crate) async fn pause(&mut self, duration: Duration) -> Step<()> {
        if self.sleep_or_cancel(duration).await {
            Err(Interrupt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blink the whole array with the indicator pattern.
    pub(crate) async fn indicator(&mut self) -> Step<()> {
        let frame = vec![self.indicator.intensity; self.port.motor_count()];
        let pause = self.indicator.pause();
        for _ in 0..self.indicator.repeats {
            self.check_cancelled()?;
            self.port.set_intensities(&frame)?;
            let interrupted = self.sleep_or_cancel(pause).await;
            self.port.reset()?;
            if interrupted {
                return Err(Interrupt::Cancelled);
            }
            self.pause(pause).await?;
        }
        Ok(())
    }

    /// Best-effort switch-off after a failure.
    fn force_zero(&mut self) {
        if let Err(e) = self.port.reset() {
            tracing::warn!(error = %e, "Could not switch motors off");
        }
    }

    /// Turn an engine result into the run outcome, switching motors off when
    /// the run stopped early.
    pub(crate) fn conclude<T>(
        &mut self,
        name: &'static str,
        result: Step<T>,
        partial: impl FnOnce() -> Option<T>,
    ) -> RunOutcome<T> {
        match result {
            Ok(output) => {
                self.set_state(EngineState::Completed);
                tracing::info!(procedure = name, "Run completed");
                RunOutcome::Completed(output)
            }
            Err(interrupt) => {
                self.force_zero();
                self.set_state(EngineState::Cancelled);
                let reason = match interrupt {
                    Interrupt::Cancelled => {
                        tracing::info!(procedure = name, "Run cancelled");
                        CancelReason::Requested
                    }
                    Interrupt::Hardware(e) => {
                        tracing::error!(procedure = name, error = %e, "Run aborted by hardware failure");
                        CancelReason::Hardware(e)
                    }
                };
                RunOutcome::Cancelled {
                    reason,
                    partial: partial(),
                }
            }
        }
    }
}
