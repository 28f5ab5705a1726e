//! lorawatch - LoRaWAN Gateway Environment Monitor Binary
//!
//! Standalone daemon: sensor acquisition, heater control, telemetry, and
//! background health observation for a gateway appliance.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lorawatch::health::{self, HealthObserver, ProbeConfig};
use lorawatch::hw::{
    DefaultHeaterOutput, DefaultLedPanel, LedPins, DEFAULT_HEATER_PIN, DEFAULT_LED_BLUE,
    DEFAULT_LED_GREEN, DEFAULT_LED_RED, DEFAULT_LED_YELLOW,
};
use lorawatch::telemetry::{MqttPublisher, TelemetryPublisher, DEFAULT_BASE_TOPIC, DEFAULT_MQTT_PORT};
use lorawatch::{
    ControlLoop, CsvLogger, HeaterConfig, HeaterController, SensorReader,
    DEFAULT_I2C_BUS, DEFAULT_LED_INTERVAL_SECS, DEFAULT_PROBE_INTERVAL_SECS,
    DEFAULT_SAMPLE_INTERVAL_SECS,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "lorawatch")]
#[command(about = "LoRaWAN gateway environment monitor and heater control")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Monitors a LoRaWAN gateway appliance: reads its \
environmental sensors, drives the case heater, logs telemetry and watches \
connectivity and packet-forwarder liveness")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Sensor/control cycle period in seconds
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_INTERVAL_SECS)]
    interval: u64,

    /// Health probe period in seconds
    #[arg(long, default_value_t = DEFAULT_PROBE_INTERVAL_SECS)]
    probe_interval: u64,

    /// BCM pin driving the heating element
    #[arg(long, default_value_t = DEFAULT_HEATER_PIN)]
    heater_pin: u8,

    /// Heater switches on below this interior temperature (degrees C)
    #[arg(long, default_value_t = lorawatch::heater::DEFAULT_TEMP_ON)]
    temp_on: f64,

    /// Heater switches off above this interior temperature (degrees C)
    #[arg(long, default_value_t = lorawatch::heater::DEFAULT_TEMP_OFF)]
    temp_off: f64,

    /// I2C bus carrying the environmental sensors
    #[arg(long, default_value_t = DEFAULT_I2C_BUS)]
    i2c_bus: u8,

    /// Telemetry CSV path
    #[arg(long, default_value = "/var/log/gateway-sensors.csv")]
    telemetry_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor daemon (default)
    Run(RunArgs),

    /// Read all sensors once, print the reading and exit
    Sample(SampleArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Endpoint probed for internet reachability
    #[arg(long, default_value = health::INTERNET_ENDPOINT)]
    internet_endpoint: String,

    /// Local web server endpoint
    #[arg(long, default_value = health::LOCAL_WEB_ENDPOINT)]
    web_endpoint: String,

    /// Local LoRa network server endpoint
    #[arg(long, default_value = health::LORAWAN_ENDPOINT)]
    lorawan_endpoint: String,

    /// Per-probe timeout in seconds
    #[arg(long, default_value_t = 3)]
    probe_timeout: u64,

    /// MQTT broker host; telemetry forwarding is disabled when omitted
    #[arg(long)]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, default_value_t = DEFAULT_MQTT_PORT)]
    mqtt_port: u16,

    /// Base MQTT topic for published channels
    #[arg(long, default_value = DEFAULT_BASE_TOPIC)]
    mqtt_topic: String,

    /// Disable the status LED panel
    #[arg(long)]
    no_leds: bool,

    /// BCM pin of the red (fault) LED
    #[arg(long, default_value_t = DEFAULT_LED_RED)]
    led_red: u8,

    /// BCM pin of the blue (internet) LED
    #[arg(long, default_value_t = DEFAULT_LED_BLUE)]
    led_blue: u8,

    /// BCM pin of the yellow (local web) LED
    #[arg(long, default_value_t = DEFAULT_LED_YELLOW)]
    led_yellow: u8,

    /// BCM pin of the green (packet forwarder) LED
    #[arg(long, default_value_t = DEFAULT_LED_GREEN)]
    led_green: u8,
}

#[derive(Args)]
struct SampleArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;
    print_banner();

    match &cli.command {
        Some(Commands::Sample(args)) => sample_command(&cli, args),
        Some(Commands::Run(args)) => run_command(&cli, args).await,
        None => {
            // Default to the run command
            let run_args = RunArgs {
                internet_endpoint: health::INTERNET_ENDPOINT.to_string(),
                web_endpoint: health::LOCAL_WEB_ENDPOINT.to_string(),
                lorawan_endpoint: health::LORAWAN_ENDPOINT.to_string(),
                probe_timeout: 3,
                mqtt_host: None,
                mqtt_port: DEFAULT_MQTT_PORT,
                mqtt_topic: DEFAULT_BASE_TOPIC.to_string(),
                no_leds: false,
                led_red: DEFAULT_LED_RED,
                led_blue: DEFAULT_LED_BLUE,
                led_yellow: DEFAULT_LED_YELLOW,
                led_green: DEFAULT_LED_GREEN,
            };
            run_command(&cli, &run_args).await
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("lorawatch - LoRaWAN gateway environment monitor");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

async fn run_command(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    info!("starting gateway monitor");

    let controller = HeaterController::new(HeaterConfig {
        on_threshold: cli.temp_on,
        off_threshold: cli.temp_off,
    })
    .context("invalid heater thresholds")?;

    // Shutdown fan-out: signal listener writes, every task selects on it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    // Health observer
    let probe_config = ProbeConfig {
        internet_endpoint: args.internet_endpoint.clone(),
        web_endpoint: args.web_endpoint.clone(),
        lorawan_endpoint: args.lorawan_endpoint.clone(),
        probe_timeout: Duration::from_secs(args.probe_timeout),
        probe_interval: Duration::from_secs(cli.probe_interval),
        ..ProbeConfig::default()
    };
    let observer = HealthObserver::new(probe_config);
    let status = observer.status_handle();
    let observer_task = tokio::spawn(observer.run(shutdown_rx.clone()));

    // Status LED panel; losing it degrades indication, not monitoring
    let indicator_task = if args.no_leds {
        info!("status LED panel disabled");
        None
    } else {
        let pins = LedPins {
            red: args.led_red,
            blue: args.led_blue,
            yellow: args.led_yellow,
            green: args.led_green,
        };
        match DefaultLedPanel::new(pins) {
            Ok(panel) => Some(tokio::spawn(health::indicate(
                panel,
                status.clone(),
                Duration::from_secs(DEFAULT_LED_INTERVAL_SECS),
                shutdown_rx.clone(),
            ))),
            Err(err) => {
                warn!("status LED panel unavailable: {err}");
                None
            }
        }
    };

    // Telemetry publisher (optional)
    let mut mqtt_driver = None;
    let publisher: Option<Box<dyn TelemetryPublisher>> = match &args.mqtt_host {
        Some(host) => {
            let (publisher, driver) =
                MqttPublisher::connect(host, args.mqtt_port, "lorawatch", &args.mqtt_topic);
            info!("forwarding telemetry to mqtt://{host}:{}", args.mqtt_port);
            mqtt_driver = Some(driver);
            Some(Box::new(publisher))
        }
        None => {
            info!("no MQTT broker configured, telemetry forwarding disabled");
            None
        }
    };

    let control = ControlLoop::new(
        SensorReader::new(cli.i2c_bus),
        controller,
        DefaultHeaterOutput::new(cli.heater_pin)?,
        CsvLogger::open(&cli.telemetry_file)
            .with_context(|| format!("cannot open telemetry file {}", cli.telemetry_file))?,
        publisher,
        status,
        Duration::from_secs(cli.interval),
    )?;

    info!("control configuration:");
    info!("  - cycle interval: {}s", cli.interval);
    info!("  - heater pin: BCM {}", cli.heater_pin);
    info!("  - thresholds: on <{} / off >{} degrees C", cli.temp_on, cli.temp_off);
    info!("  - telemetry file: {}", cli.telemetry_file);

    control.run(shutdown_rx).await;

    // The control loop only returns after the shutdown signal; give the
    // background tasks a bounded window to observe it too.
    let grace = Duration::from_secs(5);
    if tokio::time::timeout(grace, observer_task).await.is_err() {
        warn!("health observer did not stop within {grace:?}");
    }
    if let Some(task) = indicator_task {
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!("status LED task did not stop within {grace:?}");
        }
    }
    if let Some(driver) = mqtt_driver {
        driver.abort();
    }

    info!("shutdown complete");
    Ok(())
}

fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("SIGINT received"),
                        _ = sigterm.recv() => info!("SIGTERM received"),
                    }
                }
                Err(err) => {
                    error!("cannot install SIGTERM handler: {err}");
                    let _ = ctrl_c.await;
                    info!("SIGINT received");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("interrupt received");
        }

        let _ = shutdown_tx.send(true);
    });
}

fn sample_command(cli: &Cli, args: &SampleArgs) -> anyhow::Result<()> {
    let mut reader = SensorReader::new(cli.i2c_bus);
    let reading = reader.sample();

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reading)?);
        }
        "pretty" => {
            println!("Sensor reading ({})", reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
            match reading.case_temp_c {
                Some(temp) => println!("  Case temperature: {temp:.3} C"),
                None => println!("  Case temperature: unavailable"),
            }
            for (label, env) in [("Interior", reading.interior), ("Exterior", reading.exterior)] {
                match env {
                    Some(env) => println!(
                        "  {label}: {:.3} C, {:.2} %RH, {:.2} hPa",
                        env.temp_c, env.humidity_pct, env.pressure_hpa
                    ),
                    None => println!("  {label}: unavailable"),
                }
            }
        }
        other => {
            error!("unsupported format: {other}. Use 'json' or 'pretty'");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["lorawatch", "--interval", "60"]).unwrap();
        assert_eq!(cli.interval, 60);
    }

    #[test]
    fn test_default_values() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["lorawatch"]).unwrap();
        assert_eq!(cli.interval, DEFAULT_SAMPLE_INTERVAL_SECS);
        assert_eq!(cli.probe_interval, DEFAULT_PROBE_INTERVAL_SECS);
        assert_eq!(cli.heater_pin, DEFAULT_HEATER_PIN);
        assert_eq!(cli.temp_on, 4.0);
        assert_eq!(cli.temp_off, 6.0);
    }

    #[test]
    fn test_run_args_defaults() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["lorawatch", "run"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.internet_endpoint, health::INTERNET_ENDPOINT);
        assert_eq!(args.mqtt_port, DEFAULT_MQTT_PORT);
        assert!(args.mqtt_host.is_none());
        assert!(!args.no_leds);
    }
}
