//! services/app/src/adapters/notifier.rs
//!
//! Implementations of the `Notifier` port.

use std::sync::{Arc, Mutex};
use storytime_core::domain::Alert;
use storytime_core::ports::Notifier;
use tracing::warn;

/// Writes alerts to the log. Used by the headless binary.
#[derive(Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, alert: Alert) {
        warn!(title = %alert.title, message = %alert.message, "Alert shown to user.");
    }
}

/// Keeps every alert so it can be inspected later.
#[derive(Clone, Default)]
pub struct CollectingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.title).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.clear();
        }
    }
}

impl Notifier for CollectingNotifier {
    fn alert(&self, alert: Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}
