//! Sensor acquisition for the gateway appliance.
//!
//! One 1-Wire case-temperature probe plus two I2C BME280 environmental
//! sensors (interior and exterior). Every sensor is independently fallible:
//! a failed read degrades its field to absent and the cycle proceeds.

pub mod bme280;
pub mod data;
pub mod onewire;

pub use bme280::{Bme280, ADDR_EXTERIOR, ADDR_INTERIOR};
pub use data::{EnvReading, SensorReading};

use crate::error::SensorError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Which of the two environmental sensors to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvPort {
    /// In-case sensor at [`ADDR_INTERIOR`]
    Interior,
    /// Outside sensor at [`ADDR_EXTERIOR`]
    Exterior,
}

/// Reads all gateway sensors and assembles per-cycle [`SensorReading`]s.
///
/// Device discovery and calibration loading happen once at construction;
/// sensors that fail to initialize stay absent for the life of the process.
pub struct SensorReader {
    w1_device: Option<PathBuf>,
    interior: Option<Bme280>,
    exterior: Option<Bme280>,
}

impl SensorReader {
    /// Discover the 1-Wire probe and open both environmental sensors on the
    /// given I2C bus. Missing or broken devices are logged and skipped.
    #[cfg(feature = "hardware")]
    pub fn new(i2c_bus: u8) -> Self {
        let w1_device = Self::discover_case_probe(Path::new(onewire::W1_DEVICES_DIR));

        let interior = match Bme280::on_bus(i2c_bus, ADDR_INTERIOR) {
            Ok(sensor) => Some(sensor),
            Err(err) => {
                warn!("interior sensor unavailable: {err}");
                None
            }
        };
        let exterior = match Bme280::on_bus(i2c_bus, ADDR_EXTERIOR) {
            Ok(sensor) => Some(sensor),
            Err(err) => {
                warn!("exterior sensor unavailable: {err}");
                None
            }
        };

        Self {
            w1_device,
            interior,
            exterior,
        }
    }

    /// Without hardware support all sensors are absent; the daemon still
    /// runs its full cycle with empty readings.
    #[cfg(not(feature = "hardware"))]
    pub fn new(_i2c_bus: u8) -> Self {
        warn!("hardware support not compiled in; all sensors absent");
        Self {
            w1_device: Self::discover_case_probe(Path::new(onewire::W1_DEVICES_DIR)),
            interior: None,
            exterior: None,
        }
    }

    /// Build a reader from already-opened parts. Used by tests and by
    /// callers with non-standard buses.
    pub fn from_parts(
        w1_device: Option<PathBuf>,
        interior: Option<Bme280>,
        exterior: Option<Bme280>,
    ) -> Self {
        Self {
            w1_device,
            interior,
            exterior,
        }
    }

    fn discover_case_probe(dir: &Path) -> Option<PathBuf> {
        let found = onewire::discover(dir);
        if found.is_none() {
            warn!(
                "no 1-Wire temperature probe under {}; continuing without case temperature",
                dir.display()
            );
        }
        found
    }

    /// Read the case temperature from the 1-Wire probe.
    pub fn read_case_temperature(&self) -> Result<f64, SensorError> {
        let device = self.w1_device.as_deref().ok_or(SensorError::DeviceNotFound)?;
        onewire::read_temperature(device)
    }

    /// Read one environmental sensor.
    pub fn read_environment(&mut self, port: EnvPort) -> Result<EnvReading, SensorError> {
        let sensor = match port {
            EnvPort::Interior => self.interior.as_mut(),
            EnvPort::Exterior => self.exterior.as_mut(),
        };
        sensor.ok_or(SensorError::DeviceNotFound)?.read()
    }

    /// Acquire one full reading, degrading failed fields to absent.
    pub fn sample(&mut self) -> SensorReading {
        let timestamp = Utc::now();

        let case_temp_c = match self.read_case_temperature() {
            Ok(temp) => Some(temp),
            Err(SensorError::DeviceNotFound) => None,
            Err(err) => {
                warn!("case temperature read failed: {err}");
                None
            }
        };

        let interior = self.sample_environment(EnvPort::Interior);
        let exterior = self.sample_environment(EnvPort::Exterior);

        SensorReading {
            timestamp,
            case_temp_c,
            interior,
            exterior,
        }
    }

    fn sample_environment(&mut self, port: EnvPort) -> Option<EnvReading> {
        match self.read_environment(port) {
            Ok(reading) => Some(reading),
            Err(SensorError::DeviceNotFound) => None,
            Err(err) => {
                warn!("{port:?} sensor read failed: {err}");
                None
            }
        }
    }
}
