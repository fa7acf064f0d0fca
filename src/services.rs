//! Service wiring and ordered teardown.
//!
//! Everything long-lived is built here from a [`StationConfig`] so the
//! binary and the integration tests assemble the same graph. Teardown runs
//! in dependency order: producers first (network client, simulation,
//! dispatcher, scheduler), storage last.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alerts::{AlertManager, Notifier};
use crate::api::AppState;
use crate::broadcast::BroadcastHub;
use crate::config::StationConfig;
use crate::forecast::ForecastEngine;
use crate::pipeline::{MqttHandle, TelemetryBridge};
use crate::scheduler::{PredictionScheduler, SchedulerSettings};
use crate::simulation::SimulationEngine;
use crate::storage::{InMemoryStorage, SledStorage, StorageError, StorageGateway};

/// How long teardown waits for in-flight alert deliveries.
const ALERT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Services {
    pub config: Arc<StationConfig>,
    pub storage: Arc<dyn StorageGateway>,
    pub hub: Arc<BroadcastHub>,
    pub simulation: Arc<SimulationEngine>,
    pub forecast: Arc<ForecastEngine>,
    pub alerts: Arc<AlertManager>,
    pub bridge: Arc<TelemetryBridge>,
    pub scheduler: Arc<PredictionScheduler>,
    /// Parent of every producer loop; cancelled by [`Services::stop_producers`].
    workers: CancellationToken,
}

/// Open the configured backend.
pub fn open_storage(config: &StationConfig, in_memory: bool) -> Result<Arc<dyn StorageGateway>, StorageError> {
    if in_memory {
        info!("Using in-memory storage (data is not persisted)");
        return Ok(Arc::new(InMemoryStorage::new()));
    }
    let store = SledStorage::open(&config.storage.path)?;
    info!(path = %config.storage.path.display(), "Sled storage opened");
    Ok(Arc::new(store))
}

impl Services {
    pub fn build(config: StationConfig, storage: Arc<dyn StorageGateway>, notifier: Arc<dyn Notifier>) -> Self {
        let config = Arc::new(config);
        let workers = CancellationToken::new();
        let station_id = config.station.id.clone();

        let hub = Arc::new(BroadcastHub::new(config.broadcast.subscriber_buffer));

        let sim_storage = config.simulation.persist_readings.then(|| Arc::clone(&storage));
        let simulation = Arc::new(SimulationEngine::new(
            station_id.as_str(),
            Duration::from_secs(config.simulation.tick_secs),
            Arc::clone(&hub),
            sim_storage,
            workers.clone(),
        ));

        let forecast = Arc::new(ForecastEngine::from_config(&config.forecast));
        let alerts = Arc::new(AlertManager::new(notifier));

        let bridge = Arc::new(TelemetryBridge::new(
            station_id.as_str(),
            simulation.gate(),
            Arc::clone(&storage),
            Arc::clone(&hub),
        ));

        let scheduler = Arc::new(PredictionScheduler::new(
            SchedulerSettings::from(config.as_ref()),
            Arc::clone(&storage),
            Arc::clone(&forecast),
            Arc::clone(&alerts),
        ));

        Self {
            config,
            storage,
            hub,
            simulation,
            forecast,
            alerts,
            bridge,
            scheduler,
            workers,
        }
    }

    /// Load the persisted forecast model, if any. Failures are logged and
    /// leave the engine on fallback forecasts.
    pub fn load_model(&self) -> bool {
        let path = &self.config.forecast.model_path;
        match self.forecast.load_from_path(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Model artifact rejected, using fallback forecasts");
                false
            }
        }
    }

    /// Token for the bridge dispatcher and scheduler loops.
    pub fn worker_token(&self) -> CancellationToken {
        self.workers.child_token()
    }

    pub fn app_state(&self, mqtt_enabled: bool) -> AppState {
        AppState {
            config: Arc::clone(&self.config),
            storage: Arc::clone(&self.storage),
            hub: Arc::clone(&self.hub),
            simulation: Arc::clone(&self.simulation),
            forecast: Arc::clone(&self.forecast),
            alerts: Arc::clone(&self.alerts),
            bridge: mqtt_enabled.then(|| Arc::clone(&self.bridge)),
        }
    }

    /// Close the network client, then stop the simulation loop, the
    /// dispatcher and the scheduler.
    pub async fn stop_producers(&self, mqtt: Option<MqttHandle>) {
        if let Some(handle) = mqtt {
            handle.shutdown().await;
        }
        self.simulation.shutdown().await;
        self.workers.cancel();
        info!("Producers stopped");
    }

    /// Final teardown step: drain alerts, drop subscribers, close storage.
    pub async fn close(&self) {
        if tokio::time::timeout(ALERT_DRAIN_TIMEOUT, self.alerts.wait_idle()).await.is_err() {
            warn!("Pending alerts did not finish before shutdown");
        }
        self.hub.disconnect_all();
        match self.storage.close().await {
            Ok(()) => info!(backend = self.storage.backend_name(), "Storage closed"),
            Err(e) => error!(error = %e, "Failed to close storage cleanly"),
        }
    }
}
