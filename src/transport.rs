//! Serial transport for the radio and the board's USB link

use serialport::SerialPort;
use std::time::Duration;
use tracing::info;

use crate::config::RadioConfig;
use crate::{Result, TelemetryError};

/// Open a serial port whose reads give up after `timeout`.
///
/// A read timeout surfaces as `ErrorKind::TimedOut`, which the decoders treat as
/// an idle link rather than a failure.
pub fn open_serial(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|e| TelemetryError::io(format!("opening serial port {port_name}"), e.into()))?;
    info!(port = port_name, baud_rate, timeout_ms = timeout.as_millis() as u64, "Serial port opened");
    Ok(port)
}

/// Open the radio port with the configured baud rate and read timeout.
pub fn open_radio(port_name: &str, config: &RadioConfig) -> Result<Box<dyn SerialPort>> {
    open_serial(port_name, config.baud_rate, config.read_timeout())
}

/// Names of the serial ports present on this machine.
pub fn list_ports() -> Result<Vec<String>> {
    let ports =
        serialport::available_ports().map_err(|e| TelemetryError::io("listing serial ports", e.into()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
