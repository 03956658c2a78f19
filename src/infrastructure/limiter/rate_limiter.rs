use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use crate::errors::AppError;

/// Per-identifier fixed-window counter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    /// Epoch milliseconds after which the window is over.
    pub reset_time: i64,
}

/// Outcome of one hit. Throttled callers are told the full window length, so
/// nothing finer is carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited,
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub ceiling: u32,
    pub window_ms: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy { ceiling: 10, window_ms: 60_000 }
    }
}

/// Storage behind the rate limiter.
///
/// Created once at process start and handed to the gatekeeper; nothing is
/// persisted. A shared external store can implement this trait for
/// multi-instance deployments.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Records one attempt for `key` at `now_ms` and says whether it may proceed.
    async fn hit(&self, key: &str, now_ms: i64) -> Result<RateDecision, AppError>;

    /// Drops records whose window ended before `now_ms`. Returns how many went.
    async fn purge_expired(&self, now_ms: i64) -> Result<usize, AppError>;

    async fn tracked_identifiers(&self) -> Result<usize, AppError>;
}

#[async_trait]
impl<T: RateLimitStore + ?Sized> RateLimitStore for Arc<T> {
    async fn hit(&self, key: &str, now_ms: i64) -> Result<RateDecision, AppError> {
        (**self).hit(key, now_ms).await
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<usize, AppError> {
        (**self).purge_expired(now_ms).await
    }

    async fn tracked_identifiers(&self) -> Result<usize, AppError> {
        (**self).tracked_identifiers().await
    }
}

/// In-process fixed-window store.
///
/// The DashMap shard lock is held across the read and the write of a record,
/// so two concurrent hits on one identifier never both see the same count.
#[derive(Clone, Default)]
pub struct InMemoryRateLimitStore {
    map: Arc<DashMap<String, RateLimitRecord>>,
    policy: RateLimitPolicy,
}

impl InMemoryRateLimitStore {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            policy,
        }
    }

    pub fn record(&self, key: &str) -> Option<RateLimitRecord> {
        self.map.get(key).map(|r| *r)
    }

    fn fresh_window(&self, now_ms: i64) -> RateLimitRecord {
        RateLimitRecord {
            count: 1,
            reset_time: now_ms + self.policy.window_ms,
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, now_ms: i64) -> Result<RateDecision, AppError> {
        let decision = match self.map.entry(key.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(self.fresh_window(now_ms));
                RateDecision::Allowed
            }
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if now_ms > record.reset_time {
                    *record = self.fresh_window(now_ms);
                    RateDecision::Allowed
                } else if record.count >= self.policy.ceiling {
                    RateDecision::Limited
                } else {
                    record.count += 1;
                    RateDecision::Allowed
                }
            }
        };

        Ok(decision)
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<usize, AppError> {
        let before = self.map.len();
        self.map.retain(|_, record| record.reset_time >= now_ms);
        Ok(before.saturating_sub(self.map.len()))
    }

    async fn tracked_identifiers(&self) -> Result<usize, AppError> {
        Ok(self.map.len())
    }
}
