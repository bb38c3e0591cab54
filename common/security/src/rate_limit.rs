use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::SecurityError;
use crate::store::RateLimitStore;

/// Attempts permitted per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window_ms: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max: 10,
            window_ms: 60_000,
        }
    }
}

impl RateLimitPolicy {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max.max(1),
            window_ms: (window.as_millis() as u64).max(1),
        }
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.window_ms.min(i64::MAX as u64) as i64)
    }
}

/// Counter for one key. `count` only grows until `reset_at`; after that the record is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub count: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Limited {
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            RateDecision::Allowed { reset_at, .. } | RateDecision::Limited { reset_at, .. } => {
                *reset_at
            }
        }
    }
}

const LOCK_SHARDS: usize = 64;

/// Fixed-window limiter over an injected store.
///
/// Read-then-write for one key is serialised in-process; keys hashing to different
/// shards proceed independently.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    locks: Vec<Mutex<()>>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
            locks: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    fn shard(key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % LOCK_SHARDS as u64) as usize
    }

    fn lock_for(&self, key: &str) -> &Mutex<()> {
        &self.locks[Self::shard(key)]
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub async fn attempt(&self, key: &str) -> Result<RateDecision, SecurityError> {
        let _guard = self.lock_for(key).lock().await;
        let now = self.clock.now();

        let decision = match self.store.get(key).await? {
            Some(record) if now < record.reset_at => {
                if record.count < self.policy.max {
                    let next = RateRecord {
                        count: record.count + 1,
                        reset_at: record.reset_at,
                    };
                    self.store.set(key, next).await?;
                    RateDecision::Allowed {
                        remaining: self.policy.max - next.count,
                        reset_at: next.reset_at,
                    }
                } else {
                    RateDecision::Limited {
                        reset_at: record.reset_at,
                        retry_after_secs: seconds_until(now, record.reset_at),
                    }
                }
            }
            _ => {
                let fresh = RateRecord {
                    count: 1,
                    reset_at: now + self.policy.window(),
                };
                self.store.set(key, fresh).await?;
                RateDecision::Allowed {
                    remaining: self.policy.max.saturating_sub(1),
                    reset_at: fresh.reset_at,
                }
            }
        };

        debug!(key, allowed = decision.is_allowed(), "rate limit attempt");
        Ok(decision)
    }

    /// Forgets every prior attempt for `key`; used after a successful gated action.
    pub async fn reset(&self, key: &str) -> Result<(), SecurityError> {
        let _guard = self.lock_for(key).lock().await;
        self.store.remove(key).await
    }
}

fn seconds_until(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
