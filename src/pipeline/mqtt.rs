//! MQTT message source
//!
//! `rumqttc`'s synchronous client drives its event loop on a dedicated OS
//! thread. That thread does nothing but translate notifications into
//! [`SourceEvent`]s and `blocking_send` them into a bounded channel read by
//! the async dispatcher. Reconnection is left to the client: after a
//! connection error the next poll reconnects, and every `ConnAck` triggers a
//! fresh subscription.

use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::source::{ChannelSource, InboundMessage, MessageSource, SourceError, SourceEvent};
use crate::config::MqttConfig;

/// Pause between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// How long shutdown waits for the network thread to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of rumqttc's internal request queue.
const REQUEST_CAPACITY: usize = 16;

/// Async side of the MQTT bridge.
pub struct MqttSource {
    inner: ChannelSource,
}

#[async_trait]
impl MessageSource for MqttSource {
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        self.inner.next_event().await
    }

    fn source_name(&self) -> &str {
        "MQTT"
    }
}

/// Owner of the network thread; used for ordered shutdown.
pub struct MqttHandle {
    client: Client,
    topic: String,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MqttSource {
    /// Start the client thread. The connection itself is established
    /// asynchronously by the thread; failures surface as log lines and
    /// `Disconnected` events, not as an error here.
    pub fn connect(config: &MqttConfig) -> Result<(Self, MqttHandle), SourceError> {
        let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, inner) = ChannelSource::new(config.channel_capacity, "MQTT");
        let stopping = Arc::new(AtomicBool::new(false));

        info!(
            broker = %config.broker,
            port = config.port,
            topic = %config.topic,
            "[TelemetryBridge] Connecting to MQTT broker"
        );

        let thread = {
            let client = client.clone();
            let topic = config.topic.clone();
            let stopping = Arc::clone(&stopping);
            std::thread::Builder::new()
                .name("mqtt-client".to_string())
                .spawn(move || run_network_loop(client, connection, &topic, &tx, &stopping))?
        };

        Ok((
            Self { inner },
            MqttHandle {
                client,
                topic: config.topic.clone(),
                stopping,
                thread: Some(thread),
            },
        ))
    }
}

impl MqttHandle {
    /// Unsubscribe, disconnect and join the network thread.
    pub async fn shutdown(mut self) {
        self.stopping.store(true, Ordering::Release);
        if let Err(e) = self.client.try_unsubscribe(self.topic.as_str()) {
            debug!(error = %e, "[TelemetryBridge] Unsubscribe request not queued");
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "[TelemetryBridge] Disconnect request not queued");
        }

        let Some(thread) = self.thread.take() else {
            return;
        };
        let join = tokio::task::spawn_blocking(move || thread.join());
        match tokio::time::timeout(JOIN_TIMEOUT, join).await {
            Ok(Ok(Ok(()))) => info!("[TelemetryBridge] MQTT client stopped"),
            Ok(Ok(Err(_))) => error!("[TelemetryBridge] MQTT thread panicked"),
            Ok(Err(e)) => error!(error = %e, "[TelemetryBridge] Failed to join MQTT thread"),
            Err(_) => warn!("[TelemetryBridge] MQTT thread did not exit in time, detaching"),
        }
    }
}

/// Body of the network thread. Never touches shared pipeline state.
fn run_network_loop(
    mut client: Client,
    mut connection: Connection,
    topic: &str,
    tx: &mpsc::Sender<SourceEvent>,
    stopping: &AtomicBool,
) {
    for notification in connection.iter() {
        if stopping.load(Ordering::Acquire) {
            break;
        }

        let event = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                if let Err(e) = client.try_subscribe(topic, QoS::AtMostOnce) {
                    error!(error = %e, topic, "[TelemetryBridge] Subscribe failed");
                }
                SourceEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => SourceEvent::Message(InboundMessage {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
                received_at: Utc::now(),
            }),
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                info!(topic, "[TelemetryBridge] Subscribed");
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                let reason = e.to_string();
                if tx.blocking_send(SourceEvent::Disconnected { reason }).is_err() {
                    break;
                }
                std::thread::sleep(RECONNECT_DELAY);
                continue;
            }
        };

        // Receiver dropped: the dispatcher has shut down
        if tx.blocking_send(event).is_err() {
            break;
        }
    }
    debug!("[TelemetryBridge] MQTT network loop exited");
}
