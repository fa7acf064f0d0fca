//! Telemetry Ingestion Pipeline
//!
//! ```text
//! MQTT thread ──blocking_send──▶ bounded queue ──▶ dispatcher task
//!   (rumqttc event loop)                            │
//!                                                   ├─ decode JSON
//!                                                   ├─ simulation gate
//!                                                   ├─ validate fields
//!                                                   ├─ classify AQI
//!                                                   ├─ persist
//!                                                   └─ broadcast
//! ```
//!
//! The network client lives on its own OS thread and never touches shared
//! state. The bounded queue is the only crossing into the async runtime.

pub mod bridge;
pub mod mqtt;
pub mod payload;
pub mod source;

pub use bridge::{BridgeStats, IngestOutcome, TelemetryBridge};
pub use mqtt::{MqttHandle, MqttSource};
pub use payload::{PayloadError, TelemetryPayload};
pub use source::{ChannelSource, InboundMessage, MessageSource, SourceError, SourceEvent};
