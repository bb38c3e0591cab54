use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::error::SecurityError;
use crate::rate_limit::RateRecord;

/// Keyed storage for fixed-window counters.
///
/// The limiter owns the read-then-write sequence; stores only need plain get/set/remove.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SecurityError>;
    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SecurityError>;
    async fn remove(&self, key: &str) -> Result<(), SecurityError>;
}

// ---------------- In-Memory Implementation ----------------

/// Process-local store. Suitable for tests and single-instance deployments.
#[derive(Clone, Default)]
pub struct InMemoryRateStore {
    inner: Arc<Mutex<HashMap<String, RateRecord>>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Drops records whose window has already closed. Returns how many were removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.inner.lock().await;
        let before = guard.len();
        guard.retain(|_, record| now < record.reset_at);
        before - guard.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateStore {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SecurityError> {
        Ok(self.inner.lock().await.get(key).copied())
    }

    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SecurityError> {
        self.inner.lock().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SecurityError> {
        self.inner.lock().await.remove(key);
        Ok(())
    }
}

// ---------------- Redis Implementation ----------------

/// Shared store for multi-instance deployments. Records expire with their window.
#[derive(Clone)]
pub struct RedisRateStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisRateStore {
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, SecurityError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateStore {
    async fn get(&self, key: &str) -> Result<Option<RateRecord>, SecurityError> {
        let redis_key = self.key(key);
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(&redis_key).await?;
        raw.map(|value| {
            serde_json::from_str(&value)
                .map_err(|err| SecurityError::CorruptRecord(redis_key.clone(), err.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &str, record: RateRecord) -> Result<(), SecurityError> {
        let redis_key = self.key(key);
        let payload = serde_json::to_string(&record)
            .map_err(|err| SecurityError::CorruptRecord(redis_key.clone(), err.to_string()))?;
        let ttl_ms = (record.reset_at - Utc::now()).num_milliseconds().max(1);
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(&redis_key)
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SecurityError> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(self.key(key)).await?;
        Ok(())
    }
}
