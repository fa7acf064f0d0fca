//! Simulation Engine - synthetic readings on a fixed cadence
//!
//! State machine `inactive` <-> `active`. While active, a generation loop
//! emits one reading per tick for the current scenario and pushes it to the
//! broadcast hub (and storage, when configured). The engine is the only
//! writer of the simulation state; the telemetry bridge reads it through a
//! [`SimulationGate`] to suppress real data while synthetic mode is on.

mod profile;

pub use profile::{generate_reading, ScenarioProfile};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::broadcast::BroadcastHub;
use crate::storage::{StorageError, StorageGateway};
use crate::types::{Scenario, SensorReading};

struct SimulationShared {
    active: AtomicBool,
    scenario: RwLock<Scenario>,
}

impl SimulationShared {
    fn scenario(&self) -> Scenario {
        *self.scenario.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_scenario(&self, scenario: Scenario) {
        *self.scenario.write().unwrap_or_else(|e| e.into_inner()) = scenario;
    }
}

/// Read-only view of the simulation state.
#[derive(Clone)]
pub struct SimulationGate {
    shared: Arc<SimulationShared>,
}

impl SimulationGate {
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn scenario(&self) -> Scenario {
        self.shared.scenario()
    }
}

/// Snapshot reported by the status endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SimulationStatus {
    pub is_active: bool,
    pub current_scenario: Scenario,
}

/// Everything the generation loop needs, cloned into the spawned task.
#[derive(Clone)]
struct LoopContext {
    shared: Arc<SimulationShared>,
    hub: Arc<BroadcastHub>,
    storage: Option<Arc<dyn StorageGateway>>,
    station_id: String,
    tick: Duration,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SimulationEngine {
    ctx: LoopContext,
    parent_cancel: CancellationToken,
    running: Mutex<Option<RunningLoop>>,
    seed: Option<u64>,
}

impl SimulationEngine {
    /// `storage` is `Some` only when synthetic readings should be persisted.
    pub fn new(
        station_id: impl Into<String>,
        tick: Duration,
        hub: Arc<BroadcastHub>,
        storage: Option<Arc<dyn StorageGateway>>,
        parent_cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: LoopContext {
                shared: Arc::new(SimulationShared {
                    active: AtomicBool::new(false),
                    scenario: RwLock::new(Scenario::Normal),
                }),
                hub,
                storage,
                station_id: station_id.into(),
                tick,
            },
            parent_cancel,
            running: Mutex::new(None),
            seed: None,
        }
    }

    /// Fix the RNG seed so generated sequences are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn gate(&self) -> SimulationGate {
        SimulationGate {
            shared: Arc::clone(&self.ctx.shared),
        }
    }

    pub fn is_active(&self) -> bool {
        self.ctx.shared.active.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            is_active: self.is_active(),
            current_scenario: self.ctx.shared.scenario(),
        }
    }

    /// Activate synthetic mode, or switch scenario if already active.
    ///
    /// A running loop picks up the new scenario on its next tick.
    pub fn start(&self, scenario: Scenario) -> SimulationStatus {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        self.ctx.shared.set_scenario(scenario);

        if self.ctx.shared.active.swap(true, Ordering::AcqRel) {
            info!(scenario = %scenario, "[Simulation] Switching scenario");
            return self.status();
        }

        info!(scenario = %scenario, tick_secs = self.ctx.tick.as_secs_f64(), "[Simulation] Starting");
        let cancel = self.parent_cancel.child_token();
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let handle = tokio::spawn(generation_loop(self.ctx.clone(), cancel.clone(), rng));
        // A previous loop that ended on error has already exited
        *running = Some(RunningLoop { cancel, handle });
        self.status()
    }

    /// Deactivate synthetic mode and cancel the loop. Returns the prior state.
    pub fn stop(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let was_active = self.ctx.shared.active.swap(false, Ordering::AcqRel);
        if let Some(task) = running.take() {
            task.cancel.cancel();
        }
        if was_active {
            info!("[Simulation] Stopped");
        }
        was_active
    }

    /// Stop and wait for the generation loop to exit.
    pub async fn shutdown(&self) {
        let task = {
            let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
            self.ctx.shared.active.store(false, Ordering::Release);
            running.take()
        };
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                error!(error = %e, "[Simulation] Generation loop panicked");
            }
        }
    }
}

// ============================================================================
// Generation loop
// ============================================================================

async fn generation_loop(ctx: LoopContext, cancel: CancellationToken, mut rng: StdRng) {
    let mut ticker = tokio::time::interval(ctx.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("[Simulation] Generation loop cancelled");
                break;
            }
            _ = ticker.tick() => {}
        }

        if !ctx.shared.active.load(Ordering::Acquire) {
            break;
        }

        let scenario = ctx.shared.scenario();
        let reading = generate_reading(&mut rng, scenario, &ctx.station_id, Utc::now());

        if let Err(e) = publish(&ctx, reading).await {
            error!(error = %e, "[Simulation] Error in generation loop, deactivating");
            ctx.shared.active.store(false, Ordering::Release);
            break;
        }
    }
}

async fn publish(ctx: &LoopContext, mut reading: SensorReading) -> Result<(), StorageError> {
    if let Some(storage) = &ctx.storage {
        let id = storage.insert_reading(&reading).await?;
        reading = reading.with_id(id);
    }
    let outcome = ctx.hub.broadcast_reading(&reading);
    debug!(
        scenario = ?reading.scenario,
        aqi = reading.aqi,
        delivered = outcome.delivered,
        "[Simulation] Reading published"
    );
    Ok(())
}
