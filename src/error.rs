//! Error types for the relay

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay error types
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Serial port error (open, configure, enumerate)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on an open device
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No device port was configured
    #[error("No serial port configured")]
    PortNotConfigured,
}
