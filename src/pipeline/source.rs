//! Message source abstraction for telemetry ingestion.
//!
//! The dispatcher only ever sees [`SourceEvent`]s; where they come from
//! (the MQTT thread, or a test harness) is hidden behind [`MessageSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// One raw message as received from the broker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Events produced by a message source.
#[derive(Debug)]
pub enum SourceEvent {
    Message(InboundMessage),
    /// Connection to the broker (re)established.
    Connected,
    /// Connection lost; the client reconnects on its own.
    Disconnected { reason: String },
    /// Source is finished and will produce nothing further.
    Eof,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("failed to spawn network thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Trait abstracting where telemetry comes from.
///
/// The dispatcher calls [`next_event`](MessageSource::next_event) in a
/// `select!` with cancellation.
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Wait for the next event. Returns `SourceEvent::Eof` once drained.
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError>;

    /// Human-readable name for logging (e.g. "MQTT", "channel").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Channel Source
// ============================================================================

/// Source fed through a bounded channel.
///
/// The MQTT source is built on top of this; tests use it directly to
/// inject messages.
pub struct ChannelSource {
    rx: mpsc::Receiver<SourceEvent>,
    name: &'static str,
}

impl ChannelSource {
    pub fn new(capacity: usize, name: &'static str) -> (mpsc::Sender<SourceEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, name })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        // All senders gone means the producer has shut down
        Ok(self.rx.recv().await.unwrap_or(SourceEvent::Eof))
    }

    fn source_name(&self) -> &str {
        self.name
    }
}
