//! Scoped CPU-wake resource held for the duration of a write phase.
//!
//! The mechanics of keeping the machine awake belong to the host platform;
//! the session only holds an opaque guard and drops it during teardown.

/// Capability for acquiring a wake guard.
pub trait PowerMonitor: Send + Sync {
    /// Acquires a scoped wake lock. Dropping the guard releases it.
    fn keep_awake(&self) -> Box<dyn WakeGuard>;
}

/// Marker for a held wake lock; release happens on drop.
pub trait WakeGuard: Send {}

/// Power monitor for hosts without wake-lock mechanics.
pub struct NoopPower;

impl PowerMonitor for NoopPower {
    fn keep_awake(&self) -> Box<dyn WakeGuard> {
        tracing::debug!("wake guard acquired");
        Box::new(NoopGuard)
    }
}

struct NoopGuard;

impl WakeGuard for NoopGuard {}

impl Drop for NoopGuard {
    fn drop(&mut self) {
        tracing::debug!("wake guard released");
    }
}
