use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_auth::AuthzVerdict;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    auth_verdicts: IntCounterVec,
    rate_checks: IntCounterVec,
    rate_rejections: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let auth_verdicts = IntCounterVec::new(
            Opts::new(
                "gateway_auth_verdicts_total",
                "Authorization verdicts on protected routes",
            ),
            &["verdict"],
        )?;
        let rate_checks = IntCounterVec::new(
            Opts::new("gateway_rate_limit_checks_total", "Total rate limit checks"),
            &["endpoint"],
        )?;
        let rate_rejections = IntCounterVec::new(
            Opts::new(
                "gateway_rate_limit_rejections_total",
                "Total rate limit rejections",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(auth_verdicts.clone()))?;
        registry.register(Box::new(rate_checks.clone()))?;
        registry.register(Box::new(rate_rejections.clone()))?;
        Ok(Self {
            registry,
            auth_verdicts,
            rate_checks,
            rate_rejections,
        })
    }

    pub fn record_verdict(&self, verdict: &AuthzVerdict) {
        let label = match verdict {
            AuthzVerdict::Allowed(_) => "allowed",
            AuthzVerdict::Unauthenticated(_) => "unauthenticated",
            AuthzVerdict::Forbidden { .. } => "forbidden",
        };
        self.auth_verdicts.with_label_values(&[label]).inc();
    }

    pub fn record_rate_check(&self, endpoint: &str, allowed: bool) {
        self.rate_checks.with_label_values(&[endpoint]).inc();
        if !allowed {
            self.rate_rejections.with_label_values(&[endpoint]).inc();
        }
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
