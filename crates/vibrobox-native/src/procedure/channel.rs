//! Answer and cancellation channels between the control context and a run
//!
//! Answers travel through a single-slot queue: the engine clears it right
//! before it starts waiting, so only an answer given while the engine waits
//! is ever consumed. Cancellation is a watch flag the engine races against
//! every wait.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Why an answer was not accepted by the channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AnswerError {
    /// An answer is already queued and has not been consumed
    #[error("An answer is already pending")]
    SlotOccupied,

    /// The run has finished; nobody will read the answer
    #[error("The run has finished")]
    RunFinished,
}

/// Control-side end of the answer slot
#[derive(Debug)]
pub struct Responder<A> {
    tx: mpsc::Sender<A>,
}

impl<A> Clone for Responder<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A> Responder<A> {
    /// Queue an answer for the running engine. Never blocks.
    ///
    /// # Errors
    ///
    /// [`AnswerError::SlotOccupied`] when an earlier answer is still queued,
    /// [`AnswerError::RunFinished`] once the run is over.
    pub fn set_answer(&self, answer: A) -> Result<(), AnswerError> {
        self.tx.try_send(answer).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AnswerError::SlotOccupied,
            mpsc::error::TrySendError::Closed(_) => AnswerError::RunFinished,
        })
    }
}

/// Engine-side end of the answer slot
#[derive(Debug)]
pub(crate) struct ResponseSlot<A> {
    rx: mpsc::Receiver<A>,
}

impl<A> ResponseSlot<A> {
    /// Drop any stale answer. Returns how many were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// Next answer, or `None` once every responder is gone.
    pub(crate) async fn recv(&mut self) -> Option<A> {
        self.rx.recv().await
    }
}

/// Create a connected answer slot.
pub(crate) fn response_slot<A>() -> (Responder<A>, ResponseSlot<A>) {
    let (tx, rx) = mpsc::channel(1);
    (Responder { tx }, ResponseSlot { rx })
}

/// Control-side cancellation switch
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Engine-side view of the cancellation flag
///
/// A dropped [`CancelSignal`] counts as cancellation.
#[derive(Clone, Debug)]
pub(crate) struct CancelListener {
    rx: watch::Receiver<bool>,
}

impl CancelListener {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once cancellation is requested.
    pub(crate) async fn cancelled(&mut self) {
        // Err means the signal was dropped
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Create a connected cancellation pair.
pub(crate) fn cancel_signal() -> (CancelSignal, CancelListener) {
    let (tx, rx) = watch::channel(false);
    (CancelSignal { tx: Arc::new(tx) }, CancelListener { rx })
}
