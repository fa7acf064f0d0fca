//! Outbound notification channels.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AlertsConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Delivery channel for alert text. Failures never escape `send`.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`; `true` on confirmed delivery.
    async fn send(&self, text: &str) -> bool;

    fn is_configured(&self) -> bool;
}

/// Telegram Bot API `sendMessage` notifier.
pub struct TelegramNotifier {
    http: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(TELEGRAM_API, bot_token, chat_id, timeout)
    }

    /// Same as [`TelegramNotifier::new`] against a different API host.
    pub fn with_base_url(
        base_url: &str,
        bot_token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{}/sendMessage", base_url.trim_end_matches('/'), bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> bool {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        match self.http.post(&self.endpoint).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("[Alerts] Telegram alert sent");
                true
            }
            Ok(resp) => {
                error!(status = %resp.status(), "[Alerts] Telegram API rejected message");
                false
            }
            Err(e) => {
                error!(error = %e, "[Alerts] Failed to reach Telegram API");
                false
            }
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Used when no credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _text: &str) -> bool {
        warn!("[Alerts] Telegram not configured, alert not sent");
        false
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Pick a notifier from config. Falls back to [`DisabledNotifier`] when
/// credentials are missing or the HTTP client cannot be built.
pub fn from_config(cfg: &AlertsConfig) -> Arc<dyn Notifier> {
    let (Some(token), Some(chat_id)) = (cfg.telegram_bot_token.as_deref(), cfg.telegram_chat_id.as_deref()) else {
        return Arc::new(DisabledNotifier);
    };
    match TelegramNotifier::new(token, chat_id, Duration::from_secs(cfg.timeout_secs.max(1))) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!(error = %e, "[Alerts] Failed to build HTTP client, alerts disabled");
            Arc::new(DisabledNotifier)
        }
    }
}
