//! Best-effort telemetry forwarding to an MQTT broker.
//!
//! The control loop publishes per-channel values under a base topic each
//! cycle. Delivery is best-effort: failures are logged and the cycle
//! proceeds; the broker connection recovers on its own.

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default base topic for published channels.
pub const DEFAULT_BASE_TOPIC: &str = "gateway/monitor";

/// Per-channel numeric/boolean writes for sensor values and heater state.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    /// Publish a numeric measurement on the given channel.
    async fn publish_value(&self, channel: &str, value: f64) -> Result<()>;

    /// Publish an on/off state on the given channel.
    async fn publish_flag(&self, channel: &str, on: bool) -> Result<()>;
}

/// MQTT-backed publisher.
///
/// Announces itself retained on `<base>/status` with a matching offline
/// last-will, so consumers can tell a silent gateway from a dead one.
pub struct MqttPublisher {
    client: AsyncClient,
    base_topic: String,
}

impl MqttPublisher {
    /// Connect to the broker and spawn the event-loop driver task.
    ///
    /// The returned handle drives the connection until the client is
    /// dropped; it never needs to be awaited during normal operation.
    pub fn connect(
        host: &str,
        port: u16,
        client_id: &str,
        base_topic: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let base_topic = base_topic.into();
        let status_topic = format!("{base_topic}/status");

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            &status_topic,
            b"offline".to_vec(),
            QoS::AtLeastOnce,
            true,
        ));

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        let announce = client.clone();
        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                        info!("mqtt connected");
                        if let Err(err) = announce
                            .publish(&status_topic, QoS::AtLeastOnce, true, b"online".to_vec())
                            .await
                        {
                            warn!("mqtt online announcement failed: {err}");
                        }
                    }
                    Ok(event) => debug!(?event, "mqtt event"),
                    Err(err) => {
                        warn!("mqtt connection error: {err}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        (
            Self { client, base_topic },
            driver,
        )
    }

    fn topic(&self, channel: &str) -> String {
        format!("{}/{channel}", self.base_topic)
    }
}

#[async_trait]
impl TelemetryPublisher for MqttPublisher {
    async fn publish_value(&self, channel: &str, value: f64) -> Result<()> {
        self.client
            .publish(
                self.topic(channel),
                QoS::AtMostOnce,
                false,
                format!("{value:.3}"),
            )
            .await
            .map_err(|e| MonitorError::publish_error(e.to_string()))
    }

    async fn publish_flag(&self, channel: &str, on: bool) -> Result<()> {
        self.client
            .publish(
                self.topic(channel),
                QoS::AtMostOnce,
                false,
                if on { "1" } else { "0" },
            )
            .await
            .map_err(|e| MonitorError::publish_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory publisher capturing everything it is handed.
    pub struct RecordingPublisher {
        pub published: Mutex<Vec<(String, String)>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TelemetryPublisher for RecordingPublisher {
        async fn publish_value(&self, channel: &str, value: f64) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), format!("{value:.3}")));
            Ok(())
        }

        async fn publish_flag(&self, channel: &str, on: bool) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), if on { "1" } else { "0" }.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn recording_publisher_round_trip() {
        let publisher = RecordingPublisher::new();
        publisher.publish_value("temp-int", 5.4321).await.unwrap();
        publisher.publish_flag("heating", true).await.unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0], ("temp-int".to_string(), "5.432".to_string()));
        assert_eq!(published[1], ("heating".to_string(), "1".to_string()));
    }
}
