//! The main control loop: sensor acquisition, heater actuation, telemetry.
//!
//! Runs at a fixed cadence (sleep-after-work rather than absolute ticks;
//! cycle work is short relative to the interval). The heater output pin and the
//! telemetry file are owned exclusively by this loop; the shared health
//! snapshot is read opportunistically and never blocks the cadence.

use crate::error::Result;
use crate::health::StatusHandle;
use crate::heater::{HeaterController, HeaterState};
use crate::hw::HeaterOutput;
use crate::sensors::{SensorReader, SensorReading};
use crate::telemetry::{CsvLogger, TelemetryPublisher, TelemetryRecord};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Orchestrates one gateway: sensors in, heater and telemetry out.
pub struct ControlLoop<O: HeaterOutput> {
    sensors: SensorReader,
    controller: HeaterController,
    output: O,
    logger: CsvLogger,
    publisher: Option<Box<dyn TelemetryPublisher>>,
    status: StatusHandle,
    sample_interval: Duration,
}

impl<O: HeaterOutput> ControlLoop<O> {
    /// Assemble the loop and drive the heater output to its deactivated
    /// level, whatever state the pin was left in.
    pub fn new(
        sensors: SensorReader,
        controller: HeaterController,
        mut output: O,
        logger: CsvLogger,
        publisher: Option<Box<dyn TelemetryPublisher>>,
        status: StatusHandle,
        sample_interval: Duration,
    ) -> Result<Self> {
        output.set_active(false)?;
        Ok(Self {
            sensors,
            controller,
            output,
            logger,
            publisher,
            status,
            sample_interval,
        })
    }

    /// Current logical heater state.
    pub fn heater_state(&self) -> HeaterState {
        self.controller.state()
    }

    /// Run cycles until the shutdown signal fires, then force the heater
    /// off and close the telemetry store.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.sample_interval.as_secs(),
            telemetry = %self.logger.path().display(),
            "control loop running"
        );

        loop {
            let reading = self.sensors.sample();
            self.process(reading).await;

            tokio::select! {
                _ = tokio::time::sleep(self.sample_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.shutdown();
    }

    /// One control cycle over an acquired reading: evaluate the heater,
    /// actuate on transition, forward measurements, append telemetry.
    /// Every step past actuation is best-effort.
    pub async fn process(&mut self, reading: SensorReading) {
        let health = self.status.read().await.clone();
        debug!(
            internet = health.internet_reachable,
            forwarder = health.packet_forwarder_running,
            "cycle start"
        );

        if let Some(next) = self.controller.evaluate(reading.interior_temp()) {
            info!(
                state = ?next,
                interior_temp = ?reading.interior_temp(),
                "heater transition"
            );
            if let Err(err) = self.output.set_active(next.is_on()) {
                error!("heater actuation failed: {err}");
            }
        }

        let record = TelemetryRecord::new(&reading, self.controller.state());
        self.forward(&record).await;
        if let Err(err) = self.logger.append(&record) {
            error!("telemetry append failed: {err}");
        }
    }

    /// Push the cycle's measurements to the publish interface, if any.
    async fn forward(&self, record: &TelemetryRecord) {
        let Some(publisher) = self.publisher.as_deref() else {
            return;
        };

        let mut values: Vec<(&str, f64)> = Vec::new();
        if let Some(temp) = record.case_temp_c {
            values.push(("temp-case", temp));
        }
        if let Some(env) = record.interior {
            values.push(("temp-int", env.temp_c));
            values.push(("hum-int", env.humidity_pct));
            values.push(("pressure-int", env.pressure_hpa));
        }
        if let Some(env) = record.exterior {
            values.push(("temp-out", env.temp_c));
            values.push(("hum-out", env.humidity_pct));
            values.push(("pressure-out", env.pressure_hpa));
        }

        for (channel, value) in values {
            if let Err(err) = publisher.publish_value(channel, value).await {
                warn!("publish {channel} failed: {err}");
            }
        }
        if let Err(err) = publisher.publish_flag("heating", record.heating).await {
            warn!("publish heating failed: {err}");
        }
    }

    /// Force the actuator to its safe level regardless of logical state.
    /// The telemetry file is flushed on every append; dropping closes it.
    fn shutdown(mut self) {
        info!("shutting down, forcing heater off");
        if let Err(err) = self.output.set_active(false) {
            error!("failed to deactivate heater during shutdown: {err}");
        }
    }
}
