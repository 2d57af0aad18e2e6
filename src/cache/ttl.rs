//! Freshness checks against stored fetch timestamps

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{CacheKey, MetadataStore};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Useful for exercising TTL boundaries without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Decides whether a cached entry is still fresh
#[derive(Debug, Clone)]
pub struct TtlValidator<C> {
    metadata: MetadataStore,
    clock: C,
}

impl<C: Clock> TtlValidator<C> {
    pub fn new(metadata: MetadataStore, clock: C) -> Self {
        Self { metadata, clock }
    }

    /// Returns true if the entry was fetched at most `ttl_minutes` ago
    ///
    /// Missing metadata is a miss. Unreadable metadata is logged and treated
    /// as a miss as well.
    pub fn is_valid(&self, key: &CacheKey, ttl_minutes: u64) -> bool {
        let fetched_at = match self.metadata.read(key) {
            Ok(Some(timestamp)) => timestamp,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable cache metadata, treating as miss");
                return false;
            }
        };

        let age = self.clock.now() - fetched_at;
        age <= ttl(ttl_minutes)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// TTL in minutes as a duration, saturating for absurdly large values
fn ttl(minutes: u64) -> Duration {
    i64::try_from(minutes)
        .ok()
        .and_then(Duration::try_minutes)
        .unwrap_or(Duration::MAX)
}
