//! Append-only CSV telemetry store.

use crate::error::Result;
use crate::heater::HeaterState;
use crate::sensors::{EnvReading, SensorReading};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header row, written once when the target file is empty.
pub const CSV_HEADER: &str =
    "#time,temp case,temp int,hum int,pressure int,temp out,hum out,pressure out,heating";

/// Immutable per-cycle snapshot of sensor readings plus the commanded
/// heater state. Created fresh each cycle, appended once, not retained.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub case_temp_c: Option<f64>,
    pub interior: Option<EnvReading>,
    pub exterior: Option<EnvReading>,
    pub heating: bool,
}

impl TelemetryRecord {
    /// Combine a sensor reading with the heater state for this cycle.
    pub fn new(reading: &SensorReading, heater: HeaterState) -> Self {
        Self {
            timestamp: reading.timestamp,
            case_temp_c: reading.case_temp_c,
            interior: reading.interior,
            exterior: reading.exterior,
            heating: heater.is_on(),
        }
    }

    /// Render one CSV line with the fixed field order and count. Absent
    /// values become empty fields so every row has the same column count.
    pub fn to_csv_line(&self) -> String {
        let mut fields = Vec::with_capacity(9);
        fields.push(self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
        fields.push(fmt_opt(self.case_temp_c, 3));
        push_env(&mut fields, self.interior);
        push_env(&mut fields, self.exterior);
        fields.push(if self.heating { "1" } else { "0" }.to_string());
        fields.join(",")
    }
}

fn push_env(fields: &mut Vec<String>, env: Option<EnvReading>) {
    match env {
        Some(env) => {
            fields.push(format!("{:.3}", env.temp_c));
            fields.push(format!("{:.2}", env.humidity_pct));
            fields.push(format!("{:.2}", env.pressure_hpa));
        }
        None => {
            fields.push(String::new());
            fields.push(String::new());
            fields.push(String::new());
        }
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => String::new(),
    }
}

/// Appends telemetry records to a CSV file, one line per control cycle.
///
/// The file is opened in create+append mode; the header is written exactly
/// once, when the file is empty at open time. Every append is flushed so a
/// crash loses at most the in-flight record.
pub struct CsvLogger {
    path: PathBuf,
    file: File,
}

impl CsvLogger {
    /// Open (or create) the telemetry file and write the header if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{CSV_HEADER}")?;
            file.flush()?;
        }
        Ok(Self { path, file })
    }

    /// Path this logger writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk.
    pub fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        writeln!(self.file, "{}", record.to_csv_line())?;
        self.file.flush()?;
        Ok(())
    }
}
