//! 1-Wire case-temperature probe (DS18B20 family) via the kernel's sysfs
//! interface.
//!
//! The kernel exposes each enumerated device as a directory under
//! `/sys/bus/w1/devices` named `<family>-<serial>`; reading its `w1_slave`
//! file triggers a conversion and returns two text lines, the second of
//! which carries the raw value in milli-degrees as a `t=<n>` token.

use crate::error::SensorError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default sysfs root for enumerated 1-Wire devices.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// Family-code prefix of DS18B20 temperature probes.
pub const W1_FAMILY_PREFIX: &str = "28-";

/// Scan `dir` for the first device entry matching the DS18B20 family prefix
/// and return the path of its `w1_slave` data file.
///
/// Discovery runs once at startup. `None` means the daemon runs degraded
/// with case temperature permanently absent; it is not a fatal condition.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot scan 1-Wire device directory {}: {err}", dir.display());
            return None;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(W1_FAMILY_PREFIX) {
            let path = entry.path().join("w1_slave");
            debug!("1-Wire temperature probe found at {}", path.display());
            return Some(path);
        }
    }

    None
}

/// Read and parse the case temperature from a discovered device path.
pub fn read_temperature(device: &Path) -> Result<f64, SensorError> {
    let payload = fs::read_to_string(device).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            SensorError::DeviceNotFound
        } else {
            SensorError::bus_error(format!("{}: {err}", device.display()))
        }
    })?;
    parse_payload(&payload)
}

/// Parse a raw `w1_slave` payload into degrees Celsius.
///
/// Expected shape:
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
/// The first line must end with the `YES` CRC marker; the value is the
/// tenth whitespace-delimited token of the second line, `t=` followed by
/// an integer milli-degree count.
pub fn parse_payload(payload: &str) -> Result<f64, SensorError> {
    let mut lines = payload.lines();

    let crc_line = lines
        .next()
        .ok_or_else(|| SensorError::parse_failure("empty payload"))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::parse_failure("CRC check failed"));
    }

    let data_line = lines
        .next()
        .ok_or_else(|| SensorError::parse_failure("missing data line"))?;
    let token = data_line
        .split_whitespace()
        .nth(9)
        .ok_or_else(|| SensorError::parse_failure("missing temperature token"))?;
    let raw = token
        .strip_prefix("t=")
        .ok_or_else(|| SensorError::parse_failure(format!("unexpected token {token:?}")))?;
    let millidegrees: i32 = raw
        .parse()
        .map_err(|_| SensorError::parse_failure(format!("non-numeric value {raw:?}")))?;

    Ok(f64::from(millidegrees) / 1000.0)
}
