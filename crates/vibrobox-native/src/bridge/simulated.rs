//! Simulated motor array
//!
//! Records every frame instead of driving hardware. Clones share state, so a
//! clone kept by the caller can inspect what a running procedure wrote after
//! the port itself has been handed to the supervisor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use vibrobox_core::Intensity;

use super::actuation::{check_frame, ActuationError, ActuationPort, ActuationResult};

/// In-memory actuation port
#[derive(Clone, Debug)]
pub struct SimulatedPort {
    motor_count: usize,
    frames: Arc<Mutex<Vec<Vec<Intensity>>>>,
    connected: Arc<AtomicBool>,
    /// Frames accepted before the simulated cable is pulled (`usize::MAX` = never)
    frame_budget: Arc<AtomicUsize>,
}

impl SimulatedPort {
    /// Connected array of `motor_count` motors
    #[must_use]
    pub fn new(motor_count: usize) -> Self {
        Self {
            motor_count,
            frames: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            frame_budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Every frame written so far
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<Intensity>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent frame
    #[must_use]
    pub fn last_frame(&self) -> Option<Vec<Intensity>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Whether the most recent frame switched everything off
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.last_frame()
            .map_or(true, |frame| frame.iter().all(|&v| v == 0))
    }

    /// Simulate unplugging the device
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Simulate plugging it back in
    pub fn reconnect(&self) {
        self.frame_budget.store(usize::MAX, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Disconnect automatically after `frames` more frames
    pub fn fail_after(&self, frames: usize) {
        self.frame_budget.store(frames, Ordering::SeqCst);
    }

    fn consume_budget(&self) -> bool {
        self.frame_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl ActuationPort for SimulatedPort {
    fn motor_count(&self) -> usize {
        self.motor_count
    }

    fn set_intensities(&mut self, values: &[Intensity]) -> ActuationResult<()> {
        if !self.is_connected() {
            return Err(ActuationError::NotConnected);
        }
        if !self.consume_budget() {
            self.disconnect();
            return Err(ActuationError::NotConnected);
        }
        check_frame(self.motor_count, values)?;
        tracing::trace!(?values, "simulated frame");
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(values.to_vec());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_frames() {
        let mut port = SimulatedPort::new(2);
        port.set_intensities(&[5, 0]).unwrap();
        port.reset().unwrap();
        assert_eq!(port.frames(), vec![vec![5, 0], vec![0, 0]]);
        assert!(port.is_idle());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut port = SimulatedPort::new(2);
        assert!(matches!(
            port.set_intensities(&[1, 2, 3]),
            Err(ActuationError::FrameLength { .. })
        ));
        assert!(port.frames().is_empty());
    }

    #[test]
    fn test_disconnect() {
        let mut port = SimulatedPort::new(2);
        port.disconnect();
        assert!(matches!(port.reset(), Err(ActuationError::NotConnected)));
        port.reconnect();
        assert!(port.reset().is_ok());
    }

    #[test]
    fn test_fail_after_budget() {
        let mut port = SimulatedPort::new(1);
        port.fail_after(2);
        assert!(port.set_intensities(&[1]).is_ok());
        assert!(port.set_intensities(&[0]).is_ok());
        assert!(matches!(
            port.set_intensities(&[1]),
            Err(ActuationError::NotConnected)
        ));
        assert!(!port.is_connected());
    }
}
