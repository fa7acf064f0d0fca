//! Telemetry Bridge - per-message ingestion
//!
//! Messages are handled one at a time in arrival order by a single
//! dispatcher task, so storage writes and broadcasts keep the order the
//! broker delivered them in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::payload::{self, PayloadError, TelemetryPayload};
use super::source::{MessageSource, SourceEvent};
use crate::broadcast::BroadcastHub;
use crate::simulation::SimulationGate;
use crate::storage::StorageGateway;
use crate::types::{RecordId, SensorReading};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted and broadcast.
    Stored { id: RecordId, aqi: u16 },
    /// Dropped because simulation mode is on.
    Suppressed,
    /// Not decodable as a JSON object with numeric fields.
    Malformed,
    /// Decoded, but a required field is absent.
    MissingFields,
    /// Storage rejected the reading; it is lost.
    StorageFailed,
}

/// Running counters, exposed on the health endpoint.
#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    stored: AtomicU64,
    suppressed: AtomicU64,
    rejected: AtomicU64,
    storage_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BridgeStats {
    pub received: u64,
    pub stored: u64,
    pub suppressed: u64,
    pub rejected: u64,
    pub storage_failures: u64,
}

pub struct TelemetryBridge {
    station_id: String,
    gate: SimulationGate,
    storage: Arc<dyn StorageGateway>,
    hub: Arc<BroadcastHub>,
    counters: Counters,
}

impl TelemetryBridge {
    pub fn new(
        station_id: impl Into<String>,
        gate: SimulationGate,
        storage: Arc<dyn StorageGateway>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            gate,
            storage,
            hub,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        let c = &self.counters;
        BridgeStats {
            received: c.received.load(Ordering::Relaxed),
            stored: c.stored.load(Ordering::Relaxed),
            suppressed: c.suppressed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            storage_failures: c.storage_failures.load(Ordering::Relaxed),
        }
    }

    /// Process one raw payload end to end. Never fails; every degraded path
    /// is logged and reported through the returned outcome.
    pub async fn handle_message(&self, raw: &[u8], received_at: DateTime<Utc>) -> IngestOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let doc = match payload::decode(raw) {
            Ok(doc) => doc,
            Err(e) => {
                error!(error = %e, "[TelemetryBridge] Failed to parse message");
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return IngestOutcome::Malformed;
            }
        };

        if self.gate.is_active() {
            debug!("[TelemetryBridge] Simulation active, ignoring real message");
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return IngestOutcome::Suppressed;
        }

        let telemetry = match TelemetryPayload::from_value(&doc) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, payload = %doc, "[TelemetryBridge] Invalid telemetry");
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return match e {
                    PayloadError::MissingFields(_) => IngestOutcome::MissingFields,
                    _ => IngestOutcome::Malformed,
                };
            }
        };

        let reading = SensorReading::new(
            self.station_id.as_str(),
            received_at,
            telemetry.temperature,
            telemetry.humidity,
            telemetry.air_value,
            telemetry.dust_density,
        );

        let id = match self.storage.insert_reading(&reading).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, aqi = reading.aqi, "[TelemetryBridge] Failed to store reading, dropping");
                self.counters.storage_failures.fetch_add(1, Ordering::Relaxed);
                return IngestOutcome::StorageFailed;
            }
        };
        self.counters.stored.fetch_add(1, Ordering::Relaxed);

        let aqi = reading.aqi;
        let reading = reading.with_id(id.clone());
        info!(
            id = %id,
            aqi,
            category = %reading.aqi_category,
            "[TelemetryBridge] Sensor data stored"
        );
        self.hub.broadcast_reading(&reading);

        IngestOutcome::Stored { id, aqi }
    }

    /// Dispatcher loop: drain `source` until EOF, error or cancellation.
    /// Messages are handled one at a time, so persistence and broadcast keep broker arrival order.
    pub async fn run<S: MessageSource>(self: Arc<Self>, mut source: S, cancel: CancellationToken) {
        info!(source = source.source_name(), station_id = %self.station_id, "[TelemetryBridge] Dispatcher started");

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => {
                    info!("[TelemetryBridge] Shutdown signal received");
                    break;
                }
                result = source.next_event() => match result {
                    Ok(ev) => ev,
                    Err(e) => {
                        error!(error = %e, "[TelemetryBridge] Source error");
                        break;
                    }
                }
            };

            match event {
                SourceEvent::Message(msg) => {
                    debug!(topic = %msg.topic, bytes = msg.payload.len(), "[TelemetryBridge] Message received");
                    self.handle_message(&msg.payload, msg.received_at).await;
                }
                SourceEvent::Connected => info!("[TelemetryBridge] Connected to broker"),
                SourceEvent::Disconnected { reason } => {
                    warn!(reason = %reason, "[TelemetryBridge] Broker connection lost");
                }
                SourceEvent::Eof => {
                    info!(stats = ?self.stats(), "[TelemetryBridge] Source finished");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{ChannelSource, InboundMessage};
    use crate::simulation::SimulationEngine;
    use crate::storage::InMemoryStorage;
    use crate::types::Scenario;
    use std::time::Duration;

    const GOOD: &[u8] = br#"{"temperature":26.5,"humidity":55,"airValue":120,"dustDensity":18}"#;

    struct Harness {
        bridge: Arc<TelemetryBridge>,
        storage: Arc<InMemoryStorage>,
        hub: Arc<BroadcastHub>,
        sim: SimulationEngine,
    }

    fn harness() -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let hub = Arc::new(BroadcastHub::new(16));
        let sim = SimulationEngine::new(
            "station_01",
            Duration::from_secs(3600),
            Arc::clone(&hub),
            None,
            CancellationToken::new(),
        );
        let bridge = Arc::new(TelemetryBridge::new(
            "station_01",
            sim.gate(),
            storage.clone(),
            Arc::clone(&hub),
        ));
        Harness { bridge, storage, hub, sim }
    }

    #[tokio::test]
    async fn test_good_message_is_stored_and_broadcast() {
        let h = harness();
        let mut sub = h.hub.connect();

        let outcome = h.bridge.handle_message(GOOD, Utc::now()).await;
        let IngestOutcome::Stored { aqi, .. } = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(aqi, 60);

        let stored = h.storage.latest_reading("station_01").await.unwrap().unwrap();
        assert_eq!(stored.aqi, 60);
        assert_eq!(stored.temperature, 26.5);
        assert!(!stored.is_simulated);

        let msg: serde_json::Value = serde_json::from_str(&sub.rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "sensor_update");
        assert_eq!(msg["data"]["aqi"], 60);
        assert_eq!(msg["data"]["aqi_category"], "Moderate");
        assert!(msg["data"]["_id"].is_string());
    }

    #[tokio::test]
    async fn test_suppressed_while_simulating() {
        let h = harness();
        let mut sub = h.hub.connect();
        h.sim.start(Scenario::Hot);

        assert_eq!(h.bridge.handle_message(GOOD, Utc::now()).await, IngestOutcome::Suppressed);
        assert_eq!(h.storage.reading_count(), 0);
        // Only synthetic events may reach subscribers
        while let Ok(msg) = sub.rx.try_recv() {
            let msg: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(msg["data"]["is_simulated"], true);
        }
        assert_eq!(h.bridge.stats().suppressed, 1);

        h.sim.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_messages_are_dropped() {
        let h = harness();
        assert_eq!(h.bridge.handle_message(b"garbage", Utc::now()).await, IngestOutcome::Malformed);
        assert_eq!(
            h.bridge.handle_message(br#"{"temperature":20}"#, Utc::now()).await,
            IngestOutcome::MissingFields
        );
        assert_eq!(h.storage.reading_count(), 0);
        assert_eq!(h.bridge.stats().rejected, 2);
    }

    #[tokio::test]
    async fn test_storage_failure_drops_reading() {
        let h = harness();
        let mut sub = h.hub.connect();
        h.storage.close().await.unwrap();

        assert_eq!(h.bridge.handle_message(GOOD, Utc::now()).await, IngestOutcome::StorageFailed);
        assert!(sub.rx.try_recv().is_err());
        assert_eq!(h.bridge.stats().storage_failures, 1);
    }

    #[tokio::test]
    async fn test_dispatcher_preserves_arrival_order() {
        let h = harness();
        let (tx, source) = ChannelSource::new(8, "test");
        let task = tokio::spawn(Arc::clone(&h.bridge).run(source, CancellationToken::new()));

        tx.send(SourceEvent::Connected).await.unwrap();
        for air in [110, 250, 450] {
            let body = format!(r#"{{"temperature":20,"humidity":50,"airValue":{air},"dustDensity":5}}"#);
            tx.send(SourceEvent::Message(InboundMessage::new("t", body.into_bytes())))
                .await
                .unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let readings = h.storage.training_data("station_01", 1).await.unwrap();
        let values: Vec<i64> = readings.iter().map(|r| r.air_value).collect();
        assert_eq!(values, vec![110, 250, 450]);
    }

    #[tokio::test]
    async fn test_dispatcher_stops_on_cancel() {
        let h = harness();
        let (_tx, source) = ChannelSource::new(8, "test");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&h.bridge).run(source, cancel.clone()));
        cancel.cancel();
        task.await.unwrap();
    }
}
