//! Bridges to the motor array
//!
//! - [`actuation`]: The port contract every backend implements
//! - [`serial`]: USB serial controller (requires `usb` feature)
//! - [`simulated`]: In-memory array for dry runs and tests

pub mod actuation;
pub mod simulated;

#[cfg(feature = "usb")]
pub mod serial;

pub use actuation::{begin_end_indicator, ActuationError, ActuationPort, ActuationResult};
pub use simulated::SimulatedPort;

#[cfg(feature = "usb")]
pub use serial::{PortSummary, SerialActuator, DEFAULT_BAUD_RATE, PICO_USB_VID};
