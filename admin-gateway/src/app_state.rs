use std::sync::Arc;

use anyhow::Result;
use axum::extract::FromRef;
use common_auth::{AuthorizationGate, SignatureVerifier};
use common_security::{Clock, RateLimitStore, RateLimiter, SystemClock};

use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::route_policy::RoutePolicy;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub unlock_limiter: Arc<RateLimiter>,
    pub metrics: Arc<GatewayMetrics>,
    pub config: Arc<GatewayConfig>,
    pub policy: Arc<RoutePolicy>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn RateLimitStore>,
    ) -> Result<Self> {
        Self::with_clock(config, verifier, store, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`], with one clock shared by the gate and the limiter.
    pub fn with_clock(
        config: GatewayConfig,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let gate =
            AuthorizationGate::new(&config.auth_config(), verifier).with_clock(clock.clone());
        let unlock_limiter = RateLimiter::new(store, config.unlock_rate_limit).with_clock(clock);

        Ok(Self {
            gate: Arc::new(gate),
            unlock_limiter: Arc::new(unlock_limiter),
            metrics: Arc::new(GatewayMetrics::new()?),
            config: Arc::new(config),
            policy: Arc::new(RoutePolicy::standard()),
        })
    }

    pub fn with_policy(mut self, policy: RoutePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}

impl FromRef<AppState> for Arc<GatewayMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}
