//! AirWatch - air quality station server
//!
//! Bridges station telemetry from an MQTT broker to WebSocket subscribers,
//! stores readings, and runs periodic AQI forecasts with Telegram alerts.
//!
//! # Usage
//!
//! ```bash
//! # Run against the configured broker
//! cargo run --release
//!
//! # No broker, synthetic data from boot, volatile storage
//! cargo run --release -- --no-mqtt --memory-storage --simulate fire
//! ```
//!
//! # Environment Variables
//!
//! - `AIRWATCH_CONFIG`: Path to the station TOML file (default: ./airwatch.toml)
//! - `AIRWATCH_SERVER_ADDR`: Override the HTTP listen address
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: Alert delivery credentials
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use airwatch::alerts::notifier;
use airwatch::api::create_app;
use airwatch::pipeline::{MqttHandle, MqttSource};
use airwatch::services::{self, Services};
use airwatch::{Scenario, StationConfig};

/// How long shutdown waits for remaining tasks after cancellation.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "airwatch")]
#[command(about = "AirWatch air quality station server")]
#[command(version)]
struct CliArgs {
    /// Path to the station config file (overrides AIRWATCH_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Keep readings and predictions in memory only
    #[arg(long)]
    memory_storage: bool,

    /// Do not connect to the MQTT broker
    #[arg(long)]
    no_mqtt: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "AIRWATCH_LOG_JSON")]
    log_json: bool,

    /// Start simulation mode at boot with this scenario
    #[arg(long, value_name = "SCENARIO")]
    simulate: Option<Scenario>,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    TelemetryBridge,
    PredictionScheduler,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::TelemetryBridge => write!(f, "TelemetryBridge"),
            TaskName::PredictionScheduler => write!(f, "PredictionScheduler"),
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Start the MQTT client thread and its dispatcher task.
fn spawn_telemetry_bridge(task_set: &mut JoinSet<Result<TaskName>>, services: &Services) -> Result<MqttHandle> {
    let (source, handle) = MqttSource::connect(&services.config.mqtt).context("Failed to start MQTT client")?;
    let bridge = std::sync::Arc::clone(&services.bridge);
    let cancel = services.worker_token();
    task_set.spawn(async move {
        bridge.run(source, cancel).await;
        Ok(TaskName::TelemetryBridge)
    });
    Ok(handle)
}

fn spawn_scheduler(task_set: &mut JoinSet<Result<TaskName>>, services: &Services) {
    let scheduler = std::sync::Arc::clone(&services.scheduler);
    let cancel = services.worker_token();
    task_set.spawn(async move {
        scheduler.run(cancel).await;
        Ok(TaskName::PredictionScheduler)
    });
}

/// Run the supervisor loop: monitor tasks until shutdown or a failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                return Ok(());
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Wait for cancelled tasks to wind down, aborting stragglers.
async fn drain_tasks(task_set: &mut JoinSet<Result<TaskName>>) {
    let drain = async {
        while let Some(result) = task_set.join_next().await {
            match result {
                Ok(Ok(name)) => info!("Task {} stopped", name),
                Ok(Err(e)) => warn!("Task ended with error during shutdown: {}", e),
                Err(e) => warn!("Task join error during shutdown: {}", e),
            }
        }
    };
    if tokio::time::timeout(TASK_DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("Tasks did not stop in time, aborting");
        task_set.abort_all();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let mut config = StationConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    let mqtt_enabled = config.mqtt.enabled && !args.no_mqtt;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  AirWatch - Air Quality Monitoring Server");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Station ID: {}", config.station.id);
    info!("MQTT: {}", if mqtt_enabled { config.mqtt.topic.as_str() } else { "disabled" });
    info!("Prediction interval: {} minutes", config.prediction.interval_minutes);
    info!("Alert threshold: {} AQI", config.prediction.alert_threshold_aqi);

    let storage = services::open_storage(&config, args.memory_storage).context("Failed to open storage")?;
    let alerts_notifier = notifier::from_config(&config.alerts);
    if !alerts_notifier.is_configured() {
        info!("Telegram not configured, alerts will only be logged");
    }
    let services = Services::build(config, storage, alerts_notifier);

    if services.load_model() {
        info!("✓ Forecast model loaded");
    } else {
        info!("No trained model, using moving-average forecasts");
    }

    let listener = tokio::net::TcpListener::bind(&services.config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", services.config.server.addr))?;
    info!("✓ HTTP server listening on {}", services.config.server.addr);

    // Graceful shutdown via Ctrl+C
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        signal_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let mqtt_handle = if mqtt_enabled {
        Some(spawn_telemetry_bridge(&mut task_set, &services)?)
    } else {
        None
    };
    spawn_scheduler(&mut task_set, &services);

    if let Some(scenario) = args.simulate {
        services.simulation.start(scenario);
    }

    let http_cancel = CancellationToken::new();
    spawn_http_server(
        &mut task_set,
        listener,
        create_app(services.app_state(mqtt_enabled)),
        http_cancel.clone(),
    );

    let outcome = run_supervisor(&mut task_set, shutdown).await;

    // Ordered teardown: producers, then HTTP, then storage
    services.stop_producers(mqtt_handle).await;
    services.hub.disconnect_all();
    http_cancel.cancel();
    drain_tasks(&mut task_set).await;
    services.close().await;

    info!("✓ AirWatch shutdown complete");
    outcome
}
