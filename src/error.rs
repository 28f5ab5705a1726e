//! Error handling for the lorawatch daemon.

/// A specialized `Result` type for lorawatch operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Per-sensor failure modes.
///
/// Sensor errors are never fatal: the affected field is logged and rendered
/// absent for the cycle, and the control loop keeps running.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// No matching device was found (or the device disappeared)
    #[error("sensor device not found")]
    DeviceNotFound,

    /// The device produced a payload we could not parse
    #[error("failed to parse sensor payload: {0}")]
    ParseFailure(String),

    /// The bus transaction itself failed
    #[error("bus error: {0}")]
    Bus(String),
}

/// The main error type for lorawatch operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GPIO operation failed
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Telemetry publish failed
    #[error("publish error: {0}")]
    Publish(String),

    /// Sensor read failed
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),
}

impl MonitorError {
    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new publish error
    pub fn publish_error(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }
}

impl SensorError {
    /// Create a new parse failure
    pub fn parse_failure(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }

    /// Create a new bus error
    pub fn bus_error(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }
}
