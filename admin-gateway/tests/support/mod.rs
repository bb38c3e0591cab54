#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use admin_gateway::{build_router, AppState, GatewayConfig};
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use common_auth::JwtSignatureVerifier;
use common_security::{InMemoryRateStore, ManualClock};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

pub const SIGNING_SECRET: &str = "gateway-test-signing-secret";
pub const UNLOCK_SECRET: &str = "open-sesame";
pub const INTERNAL_TOKEN: &str = "internal-dev-token";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

/// Gateway wired with an HS256 verifier, an in-memory store and a frozen clock.
/// `overrides` replace or add environment variables; an empty value unsets one.
pub fn app(overrides: &[(&str, &str)]) -> TestApp {
    let mut vars: HashMap<String, String> = [
        ("AUTH_HS256_SECRET", SIGNING_SECRET),
        ("UNLOCK_SECRET", UNLOCK_SECRET),
        ("AUTH_INTERNAL_TOKEN", INTERNAL_TOKEN),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    let config = GatewayConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let clock = ManualClock::new(start());
    let state = AppState::with_clock(
        config,
        Arc::new(JwtSignatureVerifier::hs256(SIGNING_SECRET.as_bytes())),
        Arc::new(InMemoryRateStore::new()),
        Arc::new(clock.clone()),
    )
    .unwrap();

    TestApp {
        router: build_router(state.clone()),
        state,
        clock,
    }
}

pub fn token_signed_with(secret: &str, role: &str, expires_in: i64) -> String {
    let issued = start().timestamp();
    encode(
        &Header::default(),
        &json!({
            "sub": "user-17",
            "email": "ops@example.com",
            "role": role,
            "tiers": ["gold"],
            "scopes": ["reports:read"],
            "iat": issued - 30,
            "exp": issued + expires_in,
        }),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn token(role: &str) -> String {
    token_signed_with(SIGNING_SECRET, role, 3600)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// Unlock attempt arriving on a socket from `peer`.
pub fn unlock_request(peer: &str, body: &str) -> Request<Body> {
    unlock_request_forwarded(peer, None, body)
}

/// Unlock attempt from `peer` that also claims an `X-Forwarded-For` chain.
pub fn unlock_request_forwarded(
    peer: &str,
    forwarded_for: Option<&str>,
    body: &str,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/unlock")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(chain) = forwarded_for {
        builder = builder.header("x-forwarded-for", chain);
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    let addr = SocketAddr::new(peer.parse().unwrap(), 40_000);
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn secret_body(secret: &str) -> String {
    json!({ "secret": secret }).to_string()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
