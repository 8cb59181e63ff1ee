use chrono::{DateTime, Utc};
use tracing::debug;

use crate::decoration::DecorationStore;
use crate::topology::EntityKey;

/// Drives the recurring sweep of temporary segments.
///
/// The host owns the actual timer; the scheduler only tracks whether one is
/// pending so that a sweep never has two timers in flight.
#[derive(Debug)]
pub struct ExpiryScheduler {
    period_secs: f64,
    armed: bool,
    ticks: u64,
}

impl ExpiryScheduler {
    pub fn new(period_secs: f64) -> Self {
        Self {
            period_secs,
            armed: false,
            ticks: 0,
        }
    }

    /// Delay for the next host timer, or `None` if one is already pending or
    /// there is nothing left to expire.
    pub fn arm_if_needed(&mut self, store: &DecorationStore) -> Option<f64> {
        if self.armed || !store.has_temporary() {
            return None;
        }
        self.armed = true;
        Some(self.period_secs)
    }

    pub fn on_tick(&mut self, store: &mut DecorationStore, now: DateTime<Utc>) -> Vec<EntityKey> {
        self.armed = false;
        self.ticks += 1;
        let expired = store.expire(now);
        if !expired.is_empty() {
            debug!(event = "segments_expired", entities = expired.len(), tick = self.ticks);
        }
        expired
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    #[cfg(test)]
    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }
}
