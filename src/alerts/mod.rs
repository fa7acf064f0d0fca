//! Alert Manager - threshold check and fire-and-forget dispatch
//!
//! Delivery runs on a tracked background task so a slow or failing
//! notifier never delays the caller. The return value of
//! [`AlertManager::check_and_alert`] says whether an alert was raised, not
//! whether it was delivered.

pub mod notifier;

pub use notifier::{DisabledNotifier, Notifier, TelegramNotifier};

use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::aqi;

pub struct AlertManager {
    notifier: Arc<dyn Notifier>,
    in_flight: TaskTracker,
}

impl AlertManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            in_flight: TaskTracker::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.notifier.is_configured()
    }

    /// Raise an alert when `predicted_aqi` is strictly above `threshold`.
    /// Must be called from within a tokio runtime.
    pub fn check_and_alert(&self, station_id: &str, predicted_aqi: u16, threshold: u16) -> bool {
        if predicted_aqi <= threshold {
            return false;
        }

        warn!(
            station_id,
            predicted_aqi,
            threshold,
            "[Alerts] AQI alert: {} > {}",
            predicted_aqi,
            threshold
        );

        let text = format_alert(station_id, predicted_aqi, threshold);
        let notifier = Arc::clone(&self.notifier);
        self.in_flight.spawn(async move {
            if !notifier.send(&text).await {
                info!("[Alerts] Alert was not delivered");
            }
        });
        true
    }

    /// Wait for every dispatched alert to finish.
    pub async fn wait_idle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}

/// Alert body sent to the notifier.
pub fn format_alert(station_id: &str, predicted_aqi: u16, threshold: u16) -> String {
    format!(
        "🚨 *HIGH AQI ALERT* 🚨\n\n\
         Station: {station_id}\n\
         Predicted AQI: {predicted_aqi}\n\
         Threshold: {threshold}\n\n\
         Category: {}\n\
         ⚠️ Take precautions!",
        aqi::category(predicted_aqi)
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingNotifier;
    use super::*;

    #[test]
    fn test_format_alert() {
        let text = format_alert("station_01", 180, 150);
        assert_eq!(
            text,
            "🚨 *HIGH AQI ALERT* 🚨\n\nStation: station_01\nPredicted AQI: 180\nThreshold: 150\n\n\
             Category: Unhealthy\n⚠️ Take precautions!"
        );
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let recorder = Arc::new(RecordingNotifier::default());
        let alerts = AlertManager::new(recorder.clone());

        assert!(!alerts.check_and_alert("station_01", 150, 150));
        assert!(alerts.check_and_alert("station_01", 151, 150));
        alerts.wait_idle().await;

        let sent = recorder.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Predicted AQI: 151"));
    }

    #[tokio::test]
    async fn test_failed_delivery_still_reports_alert() {
        let recorder = Arc::new(RecordingNotifier { succeed: false, ..Default::default() });
        let alerts = AlertManager::new(recorder.clone());
        assert!(alerts.check_and_alert("station_01", 400, 150));
        alerts.wait_idle().await;
        assert_eq!(recorder.messages().len(), 1);
        assert!(alerts.is_configured());
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_harmless() {
        let alerts = AlertManager::new(Arc::new(DisabledNotifier));
        assert!(alerts.check_and_alert("station_01", 300, 100));
        alerts.wait_idle().await;
        assert!(!alerts.is_configured());
    }
}
