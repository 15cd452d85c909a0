//! USB serial bridge to the motor controller
//!
//! The controller firmware reads raw frames: one byte per motor, written in
//! motor order. There is no framing or acknowledgement.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use vibrobox_core::Intensity;

use super::actuation::{check_frame, ActuationError, ActuationPort, ActuationResult};

/// USB vendor ID of the Raspberry Pi Pico running the controller firmware
pub const PICO_USB_VID: u16 = 0x2E8A;

/// Default baud rate of the controller
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A serial port visible to the host
#[derive(Clone, Debug, Serialize)]
pub struct PortSummary {
    /// OS port name (e.g. "/dev/ttyACM0" or "COM3")
    pub name: String,
    /// Product or manufacturer string, when the port is USB
    pub description: Option<String>,
    /// USB vendor ID, when the port is USB
    pub vid: Option<u16>,
}

impl PortSummary {
    fn from_info(info: serialport::SerialPortInfo) -> Self {
        match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                description: usb.product.or(usb.manufacturer),
                vid: Some(usb.vid),
            },
            _ => Self {
                name: info.port_name,
                description: None,
                vid: None,
            },
        }
    }

    /// Whether this port looks like the motor controller
    fn is_controller(&self, description_hint: Option<&str>) -> bool {
        if self.vid == Some(PICO_USB_VID) {
            return true;
        }
        match (description_hint, &self.description) {
            (Some(hint), Some(description)) => description.contains(hint),
            _ => false,
        }
    }
}

/// Serial connection to the motor controller
pub struct SerialActuator {
    port: Box<dyn serialport::SerialPort>,
    port_name: String,
    motor_count: usize,
}

impl SerialActuator {
    /// Open a connection to the controller
    ///
    /// # Arguments
    ///
    /// * `port_name` - Serial port name (e.g., "/dev/ttyACM0" or "COM3")
    /// * `baud_rate` - Baud rate (typically 115200)
    /// * `motor_count` - Number of motors on the array
    ///
    /// # Errors
    ///
    /// Returns error if port cannot be opened
    pub fn open(port_name: &str, baud_rate: u32, motor_count: usize) -> ActuationResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        tracing::info!(port = port_name, baud_rate, motor_count, "Motor array connected");

        Ok(Self {
            port,
            port_name: port_name.to_string(),
            motor_count,
        })
    }

    /// Open the first port that looks like the controller.
    ///
    /// A port matches when its USB vendor is the Pico, or when its
    /// description contains `description_hint`.
    ///
    /// # Errors
    ///
    /// [`ActuationError::NotConnected`] when no port matches.
    pub fn connect_auto(
        description_hint: Option<&str>,
        baud_rate: u32,
        motor_count: usize,
    ) -> ActuationResult<Self> {
        let candidate = serialport::available_ports()?
            .into_iter()
            .map(PortSummary::from_info)
            .find(|port| port.is_controller(description_hint));

        match candidate {
            Some(port) => Self::open(&port.name, baud_rate, motor_count),
            None => {
                tracing::warn!("No motor controller found among serial ports");
                Err(ActuationError::NotConnected)
            }
        }
    }

    /// List available serial ports
    #[must_use]
    pub fn list_ports() -> Vec<PortSummary> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(PortSummary::from_info).collect())
            .unwrap_or_default()
    }

    /// Name of the open port
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ActuationPort for SerialActuator {
    fn motor_count(&self) -> usize {
        self.motor_count
    }

    fn set_intensities(&mut self, values: &[Intensity]) -> ActuationResult<()> {
        check_frame(self.motor_count, values)?;
        match self.port.write_all(values).and_then(|()| self.port.flush()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::error!(port = %self.port_name, "Motor array disconnected");
                Err(ActuationError::NotConnected)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SerialActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialActuator")
            .field("port_name", &self.port_name)
            .field("motor_count", &self.motor_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(vid: Option<u16>, description: Option<&str>) -> PortSummary {
        PortSummary {
            name: "/dev/ttyACM0".to_string(),
            description: description.map(str::to_string),
            vid,
        }
    }

    #[test]
    fn test_pico_vendor_matches() {
        assert!(summary(Some(PICO_USB_VID), None).is_controller(None));
    }

    #[test]
    fn test_description_hint_matches() {
        let port = summary(Some(0x1234), Some("USB Serial Device"));
        assert!(port.is_controller(Some("Serial Device")));
        assert!(!port.is_controller(Some("Arduino")));
        assert!(!port.is_controller(None));
    }

    #[test]
    fn test_non_usb_port_never_matches() {
        assert!(!summary(None, None).is_controller(Some("anything")));
    }
}
