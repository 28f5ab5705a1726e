//! Data structures for sensor readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One environmental sensor measurement (temperature, humidity, pressure).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvReading {
    /// Temperature in degrees Celsius
    pub temp_c: f64,
    /// Relative humidity in percent
    pub humidity_pct: f64,
    /// Barometric pressure in hectopascals
    pub pressure_hpa: f64,
}

/// A complete sensor acquisition for one control cycle.
///
/// Every field except the timestamp may be absent: a failed read degrades
/// that field to `None` rather than aborting the cycle, which keeps absence
/// distinguishable from a legitimate zero value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    /// When the acquisition started
    pub timestamp: DateTime<Utc>,
    /// Case temperature from the 1-Wire probe, if present and readable
    pub case_temp_c: Option<f64>,
    /// Interior environmental sensor
    pub interior: Option<EnvReading>,
    /// Exterior environmental sensor
    pub exterior: Option<EnvReading>,
}

impl SensorReading {
    /// Create an empty reading stamped with the current time.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            case_temp_c: None,
            interior: None,
            exterior: None,
        }
    }

    /// Interior temperature, the input to the heater controller.
    pub fn interior_temp(&self) -> Option<f64> {
        self.interior.map(|env| env.temp_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reading_has_no_fields() {
        let reading = SensorReading::empty();
        assert!(reading.case_temp_c.is_none());
        assert!(reading.interior.is_none());
        assert!(reading.exterior.is_none());
        assert!(reading.interior_temp().is_none());
    }

    #[test]
    fn absent_is_distinguishable_from_zero() {
        let mut reading = SensorReading::empty();
        reading.interior = Some(EnvReading {
            temp_c: 0.0,
            humidity_pct: 0.0,
            pressure_hpa: 0.0,
        });
        assert_eq!(reading.interior_temp(), Some(0.0));
        assert_ne!(reading.interior_temp(), None);
    }
}
