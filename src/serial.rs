//! ==============================================================================
//! serial.rs - device connection to the sensor board
//! ==============================================================================
//!
//! purpose:
//!     opens the configured serial port and exposes it as a plain byte
//!     source for the line framer. also lists the ports the platform can
//!     see, which is what operators need when the configured one is wrong.
//!
//! relationships:
//!     - used by: pipeline.rs (opens the device, hands it to framer.rs)
//!     - used by: api.rs (/api/ports) and main.rs (--list-ports)
//!     - uses: serialport
//!
//! ==============================================================================

use crate::config::SerialConfig;
use crate::error::Result;
use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// An open serial connection to the sensor
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
}

impl SerialDevice {
    /// Open the configured port (8N1, no flow control)
    ///
    /// The read timeout bounds how long a read blocks when the device is
    /// quiet; the framer checks for shutdown between timeouts.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()?;

        tracing::info!(port = %config.port, baud_rate = config.baud_rate, "serial port opened");
        Ok(Self { port })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

/// Whether the device connection is currently open
///
/// Written only by the device loop, read by the health endpoint.
#[derive(Clone, Default)]
pub struct LinkState {
    open: Arc<AtomicBool>,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

/// A port the platform reports as available
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub path: String,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let (manufacturer, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb) => (usb.manufacturer, usb.serial_number),
            _ => (None, None),
        };
        Self {
            path: info.port_name,
            manufacturer,
            serial_number,
        }
    }
}

/// Enumerate serial ports visible to this machine
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}
