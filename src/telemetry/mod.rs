//! Telemetry persistence and forwarding.
//!
//! Each control cycle appends one [`TelemetryRecord`] to the CSV store and
//! forwards the individual measurements to the publish interface when one
//! is configured.

pub mod log;
pub mod publish;

pub use log::{CsvLogger, TelemetryRecord, CSV_HEADER};
pub use publish::{MqttPublisher, TelemetryPublisher, DEFAULT_BASE_TOPIC, DEFAULT_MQTT_PORT};
