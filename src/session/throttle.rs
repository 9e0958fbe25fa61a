//! Minimum-interval throttle for in-progress notifications.

use std::time::Duration;
use tokio::time::Instant;

/// Gates deliveries to at most one per `min_interval`. Events arriving
/// inside the window are dropped, not queued: only the latest snapshot
/// matters, so delivery is at-most-once per window.
pub(crate) struct ProgressThrottle {
    min_interval: Duration,
    last_delivery: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_delivery: None,
        }
    }

    /// True when a delivery is allowed now; records the delivery.
    pub fn admit(&mut self) -> bool {
        let now = Instant::now();
        match self.last_delivery {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_delivery = Some(now);
                true
            }
        }
    }

    /// Forgets the last delivery, so the next event goes straight through.
    /// Called when a new attempt or phase begins.
    pub fn reset(&mut self) {
        self.last_delivery = None;
    }
}
