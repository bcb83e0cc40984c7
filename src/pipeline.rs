//! ==============================================================================
//! pipeline.rs - device line -> parser -> cache -> subscribers
//! ==============================================================================
//!
//! purpose:
//!     the single producer. runs the serial read loop on a blocking thread
//!     and feeds every framed line through the parser into the hub.
//!
//! failure policy:
//!     - port missing or fails to open: log cause and hints, return. the
//!       web side keeps serving the cached reading.
//!     - read error after open: log it, close the device, stop. there is
//!       no automatic reconnect; restarting the relay is an operator action.
//!     - malformed lines: warn and drop.
//!
//! shutdown:
//!     the shared flag is checked at every read timeout. once set the loop
//!     stops reading, drops the port handle and marks the link closed.
//!
//! ==============================================================================

use crate::config::{LoggingConfig, SerialConfig};
use crate::domain::SignalState;
use crate::error::RelayError;
use crate::framer::LineFramer;
use crate::hub::BroadcastHub;
use crate::parser::{LineOutcome, ReadingParser};
use crate::serial::{LinkState, SerialDevice};
use std::io::Read;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Parser + hub, shared by the device loop
pub struct Pipeline {
    parser: ReadingParser,
    hub: Arc<BroadcastHub>,
    show_readings: bool,
}

impl Pipeline {
    pub fn new(parser: ReadingParser, hub: Arc<BroadcastHub>, logging: &LoggingConfig) -> Self {
        Self {
            parser,
            hub,
            show_readings: logging.show_readings,
        }
    }

    /// Run one framed line through the pipeline.
    pub fn ingest(&self, line: &str) -> LineOutcome {
        let outcome = self.parser.classify(line);
        match &outcome {
            LineOutcome::Reading(reading) => {
                if reading.signal() == SignalState::Unrecognized {
                    tracing::debug!(state = %reading.state, "unrecognized state label passed through");
                }
                let recipients = self.hub.publish(reading.clone());
                if self.show_readings {
                    tracing::info!(
                        distance = %reading.distance,
                        state = %reading.state,
                        recipients,
                        "reading"
                    );
                }
            }
            LineOutcome::Diagnostic { text, suppressed: false } => {
                tracing::info!(device = %text, "device message");
            }
            LineOutcome::Diagnostic { suppressed: true, .. } => {}
            LineOutcome::Malformed { line, reason } => {
                tracing::warn!(line = %line, reason = %reason, "malformed reading dropped");
            }
        }
        outcome
    }

    /// Drain a framed source until it ends or shutdown is requested.
    ///
    /// Returns the source so the caller decides when it is closed.
    pub fn run<R: Read>(&self, mut framer: LineFramer<R>) -> R {
        for item in framer.by_ref() {
            match item {
                Ok(line) => {
                    self.ingest(&line);
                }
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::warn!(error = %e, "device line discarded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "serial read error, device loop stopping");
                }
            }
        }
        framer.into_inner()
    }
}

/// Log why the device could not be opened, with the usual fixes.
fn report_open_failure(serial: Option<&SerialConfig>, error: &RelayError) {
    tracing::error!(error = %error, "device connection not available");
    let port = serial.map(|s| s.port.as_str()).unwrap_or("<unset>");
    tracing::warn!("troubleshooting:");
    tracing::warn!("  1. check the sensor board is plugged in and enumerated as {port}");
    tracing::warn!("  2. set [serial].port in relay.toml or pass --port (see --list-ports)");
    tracing::warn!("  3. close any other serial monitor holding the port");
    tracing::warn!("  4. unplug and replug the board, then restart the relay");
    tracing::warn!("serving the last known reading until the relay is restarted");
}

/// Start the single device read loop on a blocking thread.
pub fn spawn_device_loop(
    serial: Option<SerialConfig>,
    pipeline: Arc<Pipeline>,
    link: LinkState,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let Some(config) = serial else {
            report_open_failure(None, &RelayError::PortNotConfigured);
            return;
        };

        let device = match SerialDevice::open(&config) {
            Ok(d) => d,
            Err(e) => {
                report_open_failure(Some(&config), &e);
                return;
            }
        };

        link.set_open(true);
        let framer = LineFramer::new(device, config.max_line_bytes, shutdown);
        let device = pipeline.run(framer);

        link.set_open(false);
        let name = device.name().unwrap_or_else(|| config.port.clone());
        drop(device);
        tracing::info!(port = %name, "serial port closed");
    })
}
