//! # lorawatch - LoRaWAN Gateway Environment Monitor
//!
//! A monitoring and control daemon for LoRaWAN gateway appliances built on
//! small Linux computers. It reads the gateway's environmental sensors,
//! keeps the electronics above freezing with a hysteresis-controlled
//! heating element, logs telemetry to CSV, and forwards measurements to an
//! MQTT broker, while a background observer tracks connectivity and
//! packet-forwarder liveness.
//!
//! ## Features
//!
//! - **Sensor acquisition**: one 1-Wire case-temperature probe plus two
//!   BME280 environmental sensors (interior/exterior), all independently
//!   fallible
//! - **Hysteresis heater control**: dead-banded on/off control, fail-safe
//!   on missing data
//! - **Health observation**: reachability probes and process-presence
//!   checks published as an atomic snapshot, with a status LED panel
//! - **Telemetry**: flushed CSV records plus best-effort MQTT forwarding
//! - **Cross-compilation**: hardware access is feature-gated (`hardware`)
//!   so the daemon builds and tests anywhere
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lorawatch::hw::{DefaultHeaterOutput, DEFAULT_HEATER_PIN};
//! use lorawatch::{
//!     ControlLoop, CsvLogger, HealthObserver, HeaterConfig, HeaterController,
//!     ProbeConfig, SensorReader,
//! };
//! use std::time::Duration;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let observer = HealthObserver::new(ProbeConfig::default());
//!     let status = observer.status_handle();
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     tokio::spawn(observer.run(shutdown_rx.clone()));
//!
//!     let control = ControlLoop::new(
//!         SensorReader::new(1),
//!         HeaterController::new(HeaterConfig::default())?,
//!         DefaultHeaterOutput::new(DEFAULT_HEATER_PIN)?,
//!         CsvLogger::open("telemetry.csv")?,
//!         None,
//!         status,
//!         Duration::from_secs(300),
//!     )?;
//!     control.run(shutdown_rx).await;
//!     Ok(())
//! }
//! ```

pub mod control;
pub mod error;
pub mod health;
pub mod heater;
pub mod hw;
pub mod sensors;
pub mod telemetry;

// Re-export public API
pub use control::ControlLoop;
pub use error::{MonitorError, Result, SensorError};
pub use health::{HealthObserver, HealthStatus, ProbeConfig, StatusHandle};
pub use heater::{HeaterConfig, HeaterController, HeaterState};
pub use sensors::{EnvPort, EnvReading, SensorReader, SensorReading};
pub use telemetry::{CsvLogger, MqttPublisher, TelemetryPublisher, TelemetryRecord};

/// The default sensor/control cycle period in seconds (5 minutes).
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 300;

/// The default health probe period in seconds.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// The default status LED refresh period in seconds.
pub const DEFAULT_LED_INTERVAL_SECS: u64 = 10;

/// The default I2C bus carrying the environmental sensors.
pub const DEFAULT_I2C_BUS: u8 = 1;
