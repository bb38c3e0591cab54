use std::time::Duration;

use crate::backoff::Backoff;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin every relative request path is resolved against.
    pub base_url: String,
    pub csrf_cookie: String,
    pub csrf_header: String,
    /// Cap on each individual attempt, not on the whole retry sequence.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            csrf_cookie: "csrf_token".to_string(),
            csrf_header: "x-csrf-token".to_string(),
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_csrf(mut self, cookie: impl Into<String>, header: impl Into<String>) -> Self {
        self.csrf_cookie = cookie.into();
        self.csrf_header = header.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub endpoint: String,
    /// Forwarded as the `role` query parameter when present.
    pub role: Option<String>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Inbound messages kept for `messages()`; older ones are evicted first.
    pub history_limit: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:3000/realtime".to_string(),
            role: None,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(15),
            history_limit: 500,
        }
    }
}

impl RealtimeConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_base, self.backoff_cap)
    }
}
