use chrono::{DateTime, Utc};
use lorawatch::telemetry::CSV_HEADER;
use lorawatch::{
    CsvLogger, EnvReading, HeaterConfig, HeaterController, HeaterState, HealthStatus,
    SensorReading, TelemetryRecord,
};
use std::path::PathBuf;

fn temp_path(tag: &str) -> PathBuf {
    let unique = format!(
        "lorawatch-it-{tag}-{}-{}.csv",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    std::env::temp_dir().join(unique)
}

fn reading(case: Option<f64>, interior: Option<f64>, exterior: Option<f64>) -> SensorReading {
    let env = |temp_c| EnvReading {
        temp_c,
        humidity_pct: 55.0,
        pressure_hpa: 1008.4,
    };
    SensorReading {
        timestamp: Utc::now(),
        case_temp_c: case,
        interior: interior.map(env),
        exterior: exterior.map(env),
    }
}

/// The reference hysteresis sequence: thresholds 4.0 on / 6.0 off
#[test]
fn test_hysteresis_reference_sequence() {
    let mut controller = HeaterController::new(HeaterConfig::default()).unwrap();

    let temps = [8.0, 5.0, 3.5, 4.5, 6.5, 5.0];
    let expected = [false, false, true, true, false, false];

    for (temp, want_on) in temps.iter().zip(expected) {
        controller.evaluate(Some(*temp));
        assert_eq!(controller.state().is_on(), want_on, "at {temp} degrees");
    }
}

/// An exterior-only sensor failure still yields a complete telemetry row
/// with interior fields populated and exterior columns empty
#[test]
fn test_exterior_failure_keeps_row_shape() {
    let path = temp_path("exterior-failure");
    let mut logger = CsvLogger::open(&path).unwrap();

    let degraded = reading(Some(10.0), Some(5.25), None);
    let record = TelemetryRecord::new(&degraded, HeaterState::Off);
    logger.append(&record).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let header_columns = CSV_HEADER.split(',').count();
    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields.len(), header_columns);

    // interior columns populated
    assert_eq!(fields[2], "5.250");
    assert_eq!(fields[3], "55.00");
    assert_eq!(fields[4], "1008.40");
    // exterior columns empty, not omitted
    assert_eq!(fields[5], "");
    assert_eq!(fields[6], "");
    assert_eq!(fields[7], "");
    assert_eq!(fields[8], "0");

    std::fs::remove_file(&path).ok();
}

/// Reopening an existing telemetry file never repeats the header
#[test]
fn test_header_written_exactly_once() {
    let path = temp_path("header-once");

    for _ in 0..3 {
        let mut logger = CsvLogger::open(&path).unwrap();
        logger
            .append(&TelemetryRecord::new(
                &reading(None, Some(5.0), Some(4.0)),
                HeaterState::Off,
            ))
            .unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let header_lines = content.lines().filter(|l| *l == CSV_HEADER).count();
    assert_eq!(header_lines, 1);
    assert_eq!(content.lines().count(), 4);

    std::fs::remove_file(&path).ok();
}

/// HealthStatus serializes with all expected fields
#[test]
fn test_health_status_serialization() {
    let status = HealthStatus {
        internet_reachable: true,
        local_web_reachable: false,
        lorawan_reachable: true,
        packet_forwarder_running: true,
        last_checked: Utc::now(),
    };

    let json = serde_json::to_string(&status).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.get("internet_reachable"), Some(&serde_json::json!(true)));
    assert_eq!(
        value.get("local_web_reachable"),
        Some(&serde_json::json!(false))
    );
    assert!(value.get("last_checked").is_some());

    let back: HealthStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, status);
}

/// A never-probed snapshot is recognizable by its epoch timestamp
#[test]
fn test_unknown_health_status() {
    let status = HealthStatus::unknown();
    assert!(!status.internet_reachable);
    assert!(!status.packet_forwarder_running);
    assert_eq!(status.last_checked, DateTime::UNIX_EPOCH);
}

/// SensorReading round-trips through JSON with absent fields preserved
#[test]
fn test_sensor_reading_serialization() {
    let sample = reading(Some(12.5), None, Some(3.75));
    let json = serde_json::to_string(&sample).unwrap();
    let back: SensorReading = serde_json::from_str(&json).unwrap();

    assert_eq!(back.case_temp_c, Some(12.5));
    assert!(back.interior.is_none());
    assert_eq!(back.exterior.map(|e| e.temp_c), Some(3.75));
}

#[cfg(not(feature = "hardware"))]
mod control_loop {
    use super::*;
    use lorawatch::hw::{MockHeaterOutput, DEFAULT_HEATER_PIN};
    use lorawatch::{ControlLoop, SensorReader};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{watch, RwLock};

    /// Drive the full control path over the reference temperature sequence
    /// and check the commanded pin level each cycle
    #[tokio::test]
    async fn test_control_loop_follows_reference_sequence() {
        let output = MockHeaterOutput::new(DEFAULT_HEATER_PIN).unwrap();
        let level = output.level_handle();
        let path = temp_path("sequence");

        let mut control = ControlLoop::new(
            SensorReader::from_parts(None, None, None),
            HeaterController::new(HeaterConfig::default()).unwrap(),
            output,
            CsvLogger::open(&path).unwrap(),
            None,
            Arc::new(RwLock::new(HealthStatus::unknown())),
            Duration::from_secs(300),
        )
        .unwrap();

        let temps = [8.0, 5.0, 3.5, 4.5, 6.5, 5.0];
        let expected = [false, false, true, true, false, false];
        for (temp, want_on) in temps.iter().zip(expected) {
            control.process(reading(None, Some(*temp), None)).await;
            assert_eq!(level.load(Ordering::SeqCst), want_on, "at {temp} degrees");
        }

        // One telemetry row per cycle plus the header
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), temps.len() + 1);

        std::fs::remove_file(&path).ok();
    }

    /// Shutdown during the sleep interrupts it and deactivates the heater
    #[tokio::test]
    async fn test_shutdown_deactivates_heater() {
        let output = MockHeaterOutput::new(DEFAULT_HEATER_PIN).unwrap();
        let level = output.level_handle();
        let path = temp_path("shutdown");

        let mut control = ControlLoop::new(
            SensorReader::from_parts(None, None, None),
            HeaterController::new(HeaterConfig::default()).unwrap(),
            output,
            CsvLogger::open(&path).unwrap(),
            None,
            Arc::new(RwLock::new(HealthStatus::unknown())),
            Duration::from_secs(3600),
        )
        .unwrap();

        control.process(reading(None, Some(1.0), None)).await;
        assert!(level.load(Ordering::SeqCst));

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(control.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        assert!(!level.load(Ordering::SeqCst));
        std::fs::remove_file(&path).ok();
    }
}
