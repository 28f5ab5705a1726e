//! Background health observation: connectivity probes, packet-forwarder
//! liveness, and the status LED panel fed from the shared snapshot.
//!
//! The observer runs decoupled from the sensor cadence. Each cycle performs
//! its probes sequentially, then replaces the shared [`HealthStatus`] in a
//! single assignment, so readers never see fields from two different
//! cycles. Probe I/O happens outside the lock.

use crate::hw::StatusLedPanel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::net::TcpStream;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Host probed for general internet reachability.
pub const INTERNET_ENDPOINT: &str = "www.google.com:443";

/// Local web server endpoint.
pub const LOCAL_WEB_ENDPOINT: &str = "127.0.0.1:80";

/// Local LoRa network server endpoint.
pub const LORAWAN_ENDPOINT: &str = "127.0.0.1:8080";

/// Known packet-forwarder process names; one running is enough.
pub const FORWARDER_PROCESSES: [&str; 2] = ["mp_pkt_fwd", "poly_pkt_fwd"];

/// One probe cycle's outcome. Replaced as a unit, never field-by-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub internet_reachable: bool,
    pub local_web_reachable: bool,
    pub lorawan_reachable: bool,
    pub packet_forwarder_running: bool,
    /// When the producing probe cycle completed
    pub last_checked: DateTime<Utc>,
}

impl HealthStatus {
    /// The never-probed snapshot: everything down, epoch timestamp.
    pub fn unknown() -> Self {
        Self {
            internet_reachable: false,
            local_web_reachable: false,
            lorawan_reachable: false,
            packet_forwarder_running: false,
            last_checked: DateTime::UNIX_EPOCH,
        }
    }
}

/// Shared, atomically-replaced health snapshot.
pub type StatusHandle = Arc<RwLock<HealthStatus>>;

/// Probe endpoints and timing.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub internet_endpoint: String,
    pub web_endpoint: String,
    pub lorawan_endpoint: String,
    /// Upper bound for each individual probe
    pub probe_timeout: Duration,
    /// Cycle period
    pub probe_interval: Duration,
    pub forwarder_processes: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            internet_endpoint: INTERNET_ENDPOINT.to_string(),
            web_endpoint: LOCAL_WEB_ENDPOINT.to_string(),
            lorawan_endpoint: LORAWAN_ENDPOINT.to_string(),
            probe_timeout: Duration::from_secs(3),
            probe_interval: Duration::from_secs(crate::DEFAULT_PROBE_INTERVAL_SECS),
            forwarder_processes: FORWARDER_PROCESSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Opaque process-presence capability. Any mechanism is acceptable as long
/// as it answers with bounded latency.
pub trait ProcessProbe: Send {
    /// Whether at least one process with the given name is running.
    fn is_running(&mut self, name: &str) -> bool;
}

/// Process probe backed by sysinfo's process table.
pub struct SysinfoProcessProbe {
    system: System,
}

impl SysinfoProcessProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProcessProbe {
    fn is_running(&mut self, name: &str) -> bool {
        self.system.refresh_processes(ProcessesToUpdate::All);
        self.system
            .processes_by_name(OsStr::new(name))
            .next()
            .is_some()
    }
}

/// Periodic prober publishing into a [`StatusHandle`].
///
/// Runs until the shutdown signal fires; individual probe failures only
/// falsify their own field and never end the task.
pub struct HealthObserver<P: ProcessProbe = SysinfoProcessProbe> {
    config: ProbeConfig,
    probe: P,
    status: StatusHandle,
}

impl HealthObserver<SysinfoProcessProbe> {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_probe(config, SysinfoProcessProbe::new())
    }
}

impl<P: ProcessProbe> HealthObserver<P> {
    /// Build an observer with a custom process-presence capability.
    pub fn with_probe(config: ProbeConfig, probe: P) -> Self {
        Self {
            config,
            probe,
            status: Arc::new(RwLock::new(HealthStatus::unknown())),
        }
    }

    /// Handle for readers of the shared snapshot.
    pub fn status_handle(&self) -> StatusHandle {
        Arc::clone(&self.status)
    }

    /// Probe forever at the configured interval until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.probe_once().await;
                    debug!(?snapshot, "health probe cycle complete");
                    // Lock held only for the assignment, never across probe I/O.
                    *self.status.write().await = snapshot;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("health observer stopped");
    }

    /// Run all probes in sequence and assemble one snapshot.
    async fn probe_once(&mut self) -> HealthStatus {
        let timeout = self.config.probe_timeout;
        let internet_reachable = probe_tcp(&self.config.internet_endpoint, timeout).await;
        let local_web_reachable = probe_tcp(&self.config.web_endpoint, timeout).await;
        let lorawan_reachable = probe_tcp(&self.config.lorawan_endpoint, timeout).await;
        let packet_forwarder_running = self
            .config
            .forwarder_processes
            .iter()
            .any(|name| self.probe.is_running(name));

        HealthStatus {
            internet_reachable,
            local_web_reachable,
            lorawan_reachable,
            packet_forwarder_running,
            last_checked: Utc::now(),
        }
    }
}

/// Best-effort TCP reachability check with a bounded timeout.
async fn probe_tcp(endpoint: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            debug!("probe {endpoint} failed: {err}");
            false
        }
        Err(_) => {
            debug!("probe {endpoint} timed out after {timeout:?}");
            false
        }
    }
}

/// Drive the status LED panel from the shared snapshot at a fixed interval.
/// All LEDs are extinguished when the task stops.
pub async fn indicate<L: StatusLedPanel>(
    mut panel: L,
    status: StatusHandle,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = status.read().await.clone();
                if let Err(err) = panel.apply(&snapshot) {
                    warn!("status LED update failed: {err}");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    if let Err(err) = panel.all_off() {
        warn!("failed to extinguish status LEDs: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    struct FixedProbe(bool);

    impl ProcessProbe for FixedProbe {
        fn is_running(&mut self, _name: &str) -> bool {
            self.0
        }
    }

    fn local_config(timeout_ms: u64) -> ProbeConfig {
        ProbeConfig {
            // Port 1 is essentially never listening
            internet_endpoint: "127.0.0.1:1".to_string(),
            web_endpoint: "127.0.0.1:1".to_string(),
            lorawan_endpoint: "127.0.0.1:1".to_string(),
            probe_timeout: Duration::from_millis(timeout_ms),
            probe_interval: Duration::from_millis(10),
            forwarder_processes: vec!["mp_pkt_fwd".to_string()],
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_probes_false() {
        assert!(!probe_tcp("127.0.0.1:1", Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn listening_endpoint_probes_true() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(probe_tcp(&addr.to_string(), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn probe_failure_only_falsifies_its_own_field() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut config = local_config(500);
        config.web_endpoint = addr;
        let mut observer = HealthObserver::with_probe(config, FixedProbe(true));

        let snapshot = observer.probe_once().await;
        assert!(!snapshot.internet_reachable);
        assert!(snapshot.local_web_reachable);
        assert!(!snapshot.lorawan_reachable);
        assert!(snapshot.packet_forwarder_running);
        assert!(snapshot.last_checked > DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn observer_publishes_snapshots_until_stopped() {
        let observer = HealthObserver::with_probe(local_config(50), FixedProbe(true));
        let status = observer.status_handle();
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(observer.run(stop_rx));

        // Wait for the first published cycle.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = status.read().await.clone();
            if snapshot.last_checked > DateTime::UNIX_EPOCH {
                assert!(snapshot.packet_forwarder_running);
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "no snapshot published");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_never_observed_torn() {
        // The observer publishes via a single assignment under the write
        // lock; emulate two alternating self-consistent snapshots and
        // assert readers only ever see one of them in full.
        let all_up = HealthStatus {
            internet_reachable: true,
            local_web_reachable: true,
            lorawan_reachable: true,
            packet_forwarder_running: true,
            last_checked: Utc::now(),
        };
        let all_down = HealthStatus {
            last_checked: Utc::now(),
            ..HealthStatus::unknown()
        };

        let status: StatusHandle = Arc::new(RwLock::new(all_up.clone()));
        let writer = Arc::clone(&status);
        let (up, down) = (all_up.clone(), all_down.clone());
        let writer_task = tokio::spawn(async move {
            for i in 0..200 {
                let next = if i % 2 == 0 { down.clone() } else { up.clone() };
                *writer.write().await = next;
                tokio::task::yield_now().await;
            }
        });

        for _ in 0..200 {
            let seen = status.read().await.clone();
            assert!(
                seen == all_up || seen == all_down,
                "torn snapshot observed: {seen:?}"
            );
            tokio::task::yield_now().await;
        }

        writer_task.await.unwrap();
    }

    #[test]
    fn default_config_matches_known_endpoints() {
        let config = ProbeConfig::default();
        assert_eq!(config.internet_endpoint, INTERNET_ENDPOINT);
        assert_eq!(config.lorawan_endpoint, LORAWAN_ENDPOINT);
        assert_eq!(config.forwarder_processes.len(), 2);
    }
}
