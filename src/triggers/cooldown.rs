//! Per-actor cooldown bookkeeping

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::ActorId;

/// Longest cooldown a table will record
pub const MAX_COOLDOWN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Expiry instants keyed by actor, one table per trigger
#[derive(Debug, Default)]
pub struct CooldownTable {
    expiries: Mutex<HashMap<ActorId, Instant>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `actor` on cooldown for `duration` from now, replacing any
    /// previous expiry. Durations past [`MAX_COOLDOWN`] are clamped and
    /// entries that already expired are dropped.
    pub fn start(&self, actor: &ActorId, duration: Duration) {
        let now = Instant::now();
        let duration = duration.min(MAX_COOLDOWN);
        let expiry = now
            .checked_add(duration)
            .or_else(|| now.checked_add(Duration::from_secs(24 * 60 * 60)))
            .unwrap_or(now);

        let mut expiries = self.expiries.lock();
        expiries.retain(|_, at| *at > now);
        if duration.is_zero() {
            expiries.remove(actor);
        } else {
            expiries.insert(actor.clone(), expiry);
        }
    }

    /// Time left, zero when not cooling down
    pub fn remaining(&self, actor: &ActorId) -> Duration {
        self.expiries
            .lock()
            .get(actor)
            .map(|expiry| expiry.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_cooling_down(&self, actor: &ActorId) -> bool {
        !self.remaining(actor).is_zero()
    }

    pub fn clear(&self, actor: &ActorId) {
        self.expiries.lock().remove(actor);
    }

    /// Drop expired entries, returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut expiries = self.expiries.lock();
        let before = expiries.len();
        expiries.retain(|_, expiry| *expiry > now);
        before - expiries.len()
    }

    pub fn len(&self) -> usize {
        self.expiries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.lock().is_empty()
    }
}
