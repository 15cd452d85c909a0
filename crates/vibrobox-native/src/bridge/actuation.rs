//! Actuation port contract
//!
//! The motor array is driven by writing one intensity per motor. A port is
//! owned by exactly one party at a time: the [`crate::Supervisor`] while idle,
//! the running procedure otherwise.

use std::time::Duration;

use thiserror::Error;
use vibrobox_core::{IndicatorConfig, Intensity};

/// Errors raised by an actuation port.
#[derive(Debug, Error)]
pub enum ActuationError {
    /// No device is attached to the port
    #[error("Hardware unavailable: motor array not connected")]
    NotConnected,

    /// Frame length differs from the motor count
    #[error("Frame has {got} values but the array has {expected} motors")]
    FrameLength {
        /// Motor count of the array
        expected: usize,
        /// Length of the rejected frame
        got: usize,
    },

    /// I/O failure while writing a frame
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[cfg(feature = "usb")]
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type for actuation operations.
pub type ActuationResult<T> = Result<T, ActuationError>;

/// Synchronous access to a motor array.
pub trait ActuationPort: Send {
    /// Number of motors (required frame length)
    fn motor_count(&self) -> usize;

    /// Drive every motor at once.
    ///
    /// # Errors
    ///
    /// Fails with [`ActuationError::FrameLength`] when `values.len()` differs
    /// from [`ActuationPort::motor_count`], or when the device is gone.
    fn set_intensities(&mut self, values: &[Intensity]) -> ActuationResult<()>;

    /// Switch every motor off.
    ///
    /// # Errors
    ///
    /// Same as [`ActuationPort::set_intensities`].
    fn reset(&mut self) -> ActuationResult<()> {
        let zeros = vec![0; self.motor_count()];
        self.set_intensities(&zeros)
    }

    /// Whether a device is currently attached
    fn is_connected(&self) -> bool {
        true
    }
}

impl<P: ActuationPort + ?Sized> ActuationPort for Box<P> {
    fn motor_count(&self) -> usize {
        (**self).motor_count()
    }

    fn set_intensities(&mut self, values: &[Intensity]) -> ActuationResult<()> {
        (**self).set_intensities(values)
    }

    fn reset(&mut self) -> ActuationResult<()> {
        (**self).reset()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Reject frames whose length does not match the array.
pub(crate) fn check_frame(expected: usize, values: &[Intensity]) -> ActuationResult<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(ActuationError::FrameLength {
            expected,
            got: values.len(),
        })
    }
}

/// Blink every motor: `repeats` pulses at the indicator intensity, each
/// `pause` on and `pause` off. Motors are left at zero.
///
/// Purely cosmetic; marks the start or end of a test for the patient.
///
/// # Errors
///
/// Propagates the first port failure.
pub async fn begin_end_indicator(
    port: &mut dyn ActuationPort,
    pattern: &IndicatorConfig,
) -> ActuationResult<()> {
    let frame = vec![pattern.intensity; port.motor_count()];
    let pause: Duration = pattern.pause();
    for _ in 0..pattern.repeats {
        port.set_intensities(&frame)?;
        tokio::time::sleep(pause).await;
        port.reset()?;
        tokio::time::sleep(pause).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SimulatedPort;

    #[test]
    fn test_check_frame() {
        assert!(check_frame(3, &[0, 0, 0]).is_ok());
        assert!(matches!(
            check_frame(3, &[0, 0]),
            Err(ActuationError::FrameLength {
                expected: 3,
                got: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_indicator_pattern() {
        let mut port = SimulatedPort::new(3);
        let probe = port.clone();
        let pattern = IndicatorConfig {
            intensity: 20,
            repeats: 2,
            pause_ms: 1,
        };
        begin_end_indicator(&mut port, &pattern).await.unwrap();

        let frames = probe.frames();
        assert_eq!(
            frames,
            vec![vec![20; 3], vec![0; 3], vec![20; 3], vec![0; 3]]
        );
    }

    #[test]
    fn test_boxed_port_forwards() {
        let port = SimulatedPort::new(4);
        let probe = port.clone();
        let mut boxed: Box<dyn ActuationPort> = Box::new(port);
        assert_eq!(boxed.motor_count(), 4);
        boxed.reset().unwrap();
        assert_eq!(probe.last_frame(), Some(vec![0; 4]));
    }
}
