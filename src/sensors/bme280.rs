//! BME280 environmental sensor driver (temperature, humidity, pressure)
//! over I2C.
//!
//! The two gateway sensors sit at fixed 7-bit addresses on the same bus:
//! 0x77 inside the case, 0x76 outside. Calibration parameters are read
//! once at construction and reused for every sample; each sample runs a
//! one-shot forced-mode conversion and applies the Bosch integer
//! compensation formulas.

use crate::error::SensorError;
use crate::sensors::data::EnvReading;
use std::time::Duration;

/// I2C address of the interior (in-case) sensor.
pub const ADDR_INTERIOR: u16 = 0x77;

/// I2C address of the exterior sensor.
pub const ADDR_EXTERIOR: u16 = 0x76;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x60;

// osrs_h = x1
const CTRL_HUM_X1: u8 = 0x01;
// osrs_t = x1, osrs_p = x1, mode = forced
const CTRL_MEAS_FORCED_X1: u8 = 0x25;

// Worst-case conversion time at x1 oversampling is just under 10 ms.
const MEASUREMENT_DELAY: Duration = Duration::from_millis(10);

/// Byte-level I2C access to one addressed device.
///
/// The production implementation wraps an rppal bus handle; tests use an
/// in-memory register file.
pub trait I2cTransport: Send + Sync {
    /// Write raw bytes (register address followed by data) to the device.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError>;

    /// Read `buf.len()` bytes starting at register `reg`.
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError>;
}

/// Factory-programmed compensation parameters, register layout per the
/// Bosch datasheet.
#[derive(Debug, Clone)]
pub struct Calibration {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,
    dig_p1: u16,
    dig_p2: i16,
    dig_p3: i16,
    dig_p4: i16,
    dig_p5: i16,
    dig_p6: i16,
    dig_p7: i16,
    dig_p8: i16,
    dig_p9: i16,
    dig_h1: u8,
    dig_h2: i16,
    dig_h3: u8,
    dig_h4: i16,
    dig_h5: i16,
    dig_h6: i8,
}

fn u16_le(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn i16_le(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

impl Calibration {
    /// Assemble calibration data from the 0x88..0xA1 block (26 bytes) and
    /// the 0xE1..0xE7 block (7 bytes).
    pub fn from_registers(tp: &[u8; 26], h: &[u8; 7]) -> Self {
        Self {
            dig_t1: u16_le(tp, 0),
            dig_t2: i16_le(tp, 2),
            dig_t3: i16_le(tp, 4),
            dig_p1: u16_le(tp, 6),
            dig_p2: i16_le(tp, 8),
            dig_p3: i16_le(tp, 10),
            dig_p4: i16_le(tp, 12),
            dig_p5: i16_le(tp, 14),
            dig_p6: i16_le(tp, 16),
            dig_p7: i16_le(tp, 18),
            dig_p8: i16_le(tp, 20),
            dig_p9: i16_le(tp, 22),
            // tp[24] is the unused 0xA0 register
            dig_h1: tp[25],
            dig_h2: i16_le(h, 0),
            dig_h3: h[2],
            // dig_h4/dig_h5 are 12-bit values sharing register 0xE5
            dig_h4: (i16::from(h[3]) << 4) | i16::from(h[4] & 0x0F),
            dig_h5: (i16::from(h[5]) << 4) | i16::from(h[4] >> 4),
            dig_h6: h[6] as i8,
        }
    }

    /// Temperature in degrees Celsius plus the shared `t_fine` carry used
    /// by the pressure and humidity formulas.
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, i32) {
        let adc_t = i64::from(adc_t);
        let t1 = i64::from(self.dig_t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i64::from(self.dig_t2)) >> 11;
        let var2 = ((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * i64::from(self.dig_t3)
            >> 14;
        let t_fine = (var1 + var2) as i32;
        let centidegrees = (i64::from(t_fine) * 5 + 128) >> 8;
        (centidegrees as f64 / 100.0, t_fine)
    }

    /// Pressure in hectopascals. Returns `None` when the divisor underflows
    /// (uninitialized calibration), per the reference implementation.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> Option<f64> {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.dig_p6);
        var2 += (var1 * i64::from(self.dig_p5)) << 17;
        var2 += i64::from(self.dig_p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.dig_p3)) >> 8)
            + ((var1 * i64::from(self.dig_p2)) << 12);
        var1 = ((1i64 << 47) + var1) * i64::from(self.dig_p1) >> 33;
        if var1 == 0 {
            return None;
        }
        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(self.dig_p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.dig_p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.dig_p7) << 4);
        // p is Pa in Q24.8 fixed point
        Some(p as f64 / 256.0 / 100.0)
    }

    /// Relative humidity in percent, clamped to the sensor's 0..100 range.
    pub fn compensate_humidity(&self, adc_h: i32, t_fine: i32) -> f64 {
        let adc_h = i64::from(adc_h);
        let v = i64::from(t_fine) - 76_800;
        let term1 = ((adc_h << 14) - (i64::from(self.dig_h4) << 20) - i64::from(self.dig_h5) * v
            + 16_384)
            >> 15;
        let term2 = (((((v * i64::from(self.dig_h6)) >> 10)
            * (((v * i64::from(self.dig_h3)) >> 11) + 32_768))
            >> 10)
            + 2_097_152)
            * i64::from(self.dig_h2)
            + 8_192;
        let mut x = term1 * (term2 >> 14);
        x -= (((x >> 15) * (x >> 15)) >> 7) * i64::from(self.dig_h1) >> 4;
        let x = x.clamp(0, 419_430_400);
        // Q22.10 %RH
        (x >> 12) as f64 / 1024.0
    }
}

/// One BME280 device: a transport plus its calibration constants.
pub struct Bme280 {
    transport: Box<dyn I2cTransport>,
    calibration: Calibration,
}

impl Bme280 {
    /// Probe the chip id and load calibration data over the given transport.
    pub fn new(mut transport: Box<dyn I2cTransport>) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        transport.read_registers(REG_CHIP_ID, &mut id)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::bus_error(format!(
                "unexpected chip id 0x{:02x} (want 0x{CHIP_ID:02x})",
                id[0]
            )));
        }

        let mut tp = [0u8; 26];
        transport.read_registers(REG_CALIB_TP, &mut tp)?;
        let mut h = [0u8; 7];
        transport.read_registers(REG_CALIB_H, &mut h)?;

        Ok(Self {
            transport,
            calibration: Calibration::from_registers(&tp, &h),
        })
    }

    /// Open the sensor at `addr` on an rppal I2C bus.
    #[cfg(feature = "hardware")]
    pub fn on_bus(bus: u8, addr: u16) -> Result<Self, SensorError> {
        Self::new(Box::new(rppal_bus::RppalI2c::open(bus, addr)?))
    }

    /// Run one forced-mode conversion and return the compensated reading.
    pub fn read(&mut self) -> Result<EnvReading, SensorError> {
        self.transport.write(&[REG_CTRL_HUM, CTRL_HUM_X1])?;
        self.transport
            .write(&[REG_CTRL_MEAS, CTRL_MEAS_FORCED_X1])?;
        std::thread::sleep(MEASUREMENT_DELAY);

        let mut raw = [0u8; 8];
        self.transport.read_registers(REG_DATA, &mut raw)?;

        let adc_p =
            (i32::from(raw[0]) << 12) | (i32::from(raw[1]) << 4) | (i32::from(raw[2]) >> 4);
        let adc_t =
            (i32::from(raw[3]) << 12) | (i32::from(raw[4]) << 4) | (i32::from(raw[5]) >> 4);
        let adc_h = (i32::from(raw[6]) << 8) | i32::from(raw[7]);

        let (temp_c, t_fine) = self.calibration.compensate_temperature(adc_t);
        let pressure_hpa = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or_else(|| SensorError::parse_failure("pressure compensation underflow"))?;
        let humidity_pct = self.calibration.compensate_humidity(adc_h, t_fine);

        Ok(EnvReading {
            temp_c,
            humidity_pct,
            pressure_hpa,
        })
    }
}

#[cfg(feature = "hardware")]
mod rppal_bus {
    use super::I2cTransport;
    use crate::error::SensorError;
    use rppal::i2c::I2c;

    /// rppal-backed transport bound to a single device address.
    pub struct RppalI2c {
        bus: I2c,
    }

    impl RppalI2c {
        pub fn open(bus: u8, addr: u16) -> Result<Self, SensorError> {
            let mut bus = I2c::with_bus(bus)
                .map_err(|e| SensorError::bus_error(format!("open i2c bus: {e}")))?;
            bus.set_slave_address(addr)
                .map_err(|e| SensorError::bus_error(format!("set address 0x{addr:02x}: {e}")))?;
            Ok(Self { bus })
        }
    }

    impl I2cTransport for RppalI2c {
        fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
            self.bus
                .write(bytes)
                .map(|_| ())
                .map_err(|e| SensorError::bus_error(e.to_string()))
        }

        fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
            self.bus
                .write_read(&[reg], buf)
                .map_err(|e| SensorError::bus_error(e.to_string()))
        }
    }
}
