//! Broadcast Hub - fans live events out to every connected subscriber
//!
//! Each subscriber owns a bounded queue drained by its own writer task
//! (the WebSocket handler). `broadcast` encodes an event once, takes a
//! snapshot of the current subscriber set and `try_send`s into every queue.
//! A closed or full queue counts as a failed send: that subscriber alone is
//! disconnected and delivery to the rest continues. Nothing here awaits, so
//! one slow client can never delay the others.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::types::SensorReading;

/// Handle identifying one live subscriber.
pub type SubscriberId = u64;

/// Events pushed to subscribers, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HubEvent<'a> {
    SensorUpdate(&'a SensorReading),
}

/// Receiving side handed to a newly connected subscriber.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// Result of one `broadcast` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub pruned: usize,
}

pub struct BroadcastHub {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    /// `buffer` is the per-subscriber queue depth.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn connect(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        let total = {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            subs.insert(id, tx);
            subs.len()
        };
        info!(subscriber = id, total, "[BroadcastHub] Subscriber connected");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            (subs.remove(&id).is_some(), subs.len())
        };
        if removed {
            info!(subscriber = id, total, "[BroadcastHub] Subscriber disconnected");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop every subscriber; their writer tasks see a closed queue and exit.
    pub fn disconnect_all(&self) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        if !subs.is_empty() {
            info!(count = subs.len(), "[BroadcastHub] Disconnecting all subscribers");
        }
        subs.clear();
    }

    /// Push an event to every subscriber. Never fails; problems are logged.
    pub fn broadcast(&self, event: &HubEvent<'_>) -> BroadcastOutcome {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Arc<str>>)> = {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            if subs.is_empty() {
                return BroadcastOutcome::default();
            }
            subs.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let encoded: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "[BroadcastHub] Failed to encode event");
                return BroadcastOutcome::default();
            }
        };

        let mut outcome = BroadcastOutcome::default();
        for (id, tx) in snapshot {
            match tx.try_send(Arc::clone(&encoded)) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, "[BroadcastHub] Subscriber queue full, disconnecting");
                    self.disconnect(id);
                    outcome.pruned += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = id, "[BroadcastHub] Subscriber gone, disconnecting");
                    self.disconnect(id);
                    outcome.pruned += 1;
                }
            }
        }
        outcome
    }

    pub fn broadcast_reading(&self, reading: &SensorReading) -> BroadcastOutcome {
        self.broadcast(&HubEvent::SensorUpdate(reading))
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(crate::config::defaults::DEFAULT_SUBSCRIBER_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading() -> SensorReading {
        SensorReading::new("station_01", Utc::now(), 26.5, 55.0, 120, 18.0)
    }

    #[test]
    fn test_broadcast_with_no_subscribers_is_noop() {
        let hub = BroadcastHub::new(4);
        assert_eq!(hub.broadcast_reading(&reading()), BroadcastOutcome::default());
    }

    #[tokio::test]
    async fn test_event_envelope() {
        let hub = BroadcastHub::new(4);
        let mut sub = hub.connect();
        hub.broadcast_reading(&reading());

        let msg = sub.rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(json["type"], "sensor_update");
        assert_eq!(json["data"]["aqi"], 60);
        assert_eq!(json["data"]["station_id"], "station_01");
    }

    #[tokio::test]
    async fn test_failed_subscriber_is_pruned_others_receive() {
        let hub = BroadcastHub::new(4);
        let mut a = hub.connect();
        let b = hub.connect();
        let mut c = hub.connect();
        let failing = b.id;
        drop(b);

        let outcome = hub.broadcast_reading(&reading());
        assert_eq!(outcome, BroadcastOutcome { delivered: 2, pruned: 1 });
        assert_eq!(hub.subscriber_count(), 2);
        assert!(!hub.disconnect(failing));

        assert!(a.rx.recv().await.is_some());
        assert!(c.rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_others() {
        let hub = BroadcastHub::new(1);
        let _stalled = hub.connect();
        let mut live = hub.connect();

        // First event fills the stalled queue
        assert_eq!(hub.broadcast_reading(&reading()).delivered, 2);
        assert!(live.rx.recv().await.is_some());

        // Second event overflows it; only the stalled one is dropped
        let outcome = hub.broadcast_reading(&reading());
        assert_eq!(outcome, BroadcastOutcome { delivered: 1, pruned: 1 });
        assert!(live.rx.recv().await.is_some());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let hub = BroadcastHub::new(4);
        assert!(!hub.disconnect(42));
        let sub = hub.connect();
        assert!(hub.disconnect(sub.id));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
