//! `POST /api/unlock`: trade a shared secret for access to the godmode area.
//!
//! The rate limit is checked before anything else, so malformed and wrong
//! attempts all count. A correct secret clears the caller's record.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use common_http_errors::ApiError;
use common_security::{constant_time_eq, RateDecision};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::client_ip::client_key;

const ENDPOINT: &str = "unlock";

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Failure rendered as `{ok: false, error: <code>}`; status and headers come from [`ApiError`].
#[derive(Debug)]
pub struct UnlockRejection(pub ApiError);

impl From<ApiError> for UnlockRejection {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

impl IntoResponse for UnlockRejection {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let (parts, _) = self.0.into_response().into_parts();
        let body = Json(json!({ "ok": false, "error": code })).into_response().into_body();
        Response::from_parts(parts, body)
    }
}

pub async fn unlock(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UnlockResponse>, UnlockRejection> {
    let peer = peer.map(|ConnectInfo(addr)| addr);
    let key = format!(
        "{ENDPOINT}:{}",
        client_key(&headers, peer, &state.config.trusted_proxies)
    );

    let decision = state.unlock_limiter.attempt(&key).await.map_err(|err| {
        error!(error = %err, "unlock rate limiter unavailable");
        ApiError::unavailable("rate_limiter_unavailable")
    })?;
    state.metrics.record_rate_check(ENDPOINT, decision.is_allowed());
    if let RateDecision::Limited { retry_after_secs, .. } = decision {
        warn!(%key, retry_after_secs, "unlock attempts exhausted");
        return Err(ApiError::too_many_requests(retry_after_secs).into());
    }

    let request: UnlockRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("invalid_body", None))?;
    if request.secret.is_empty() {
        return Err(ApiError::bad_request("missing_secret", None).into());
    }

    let Some(expected) = state.config.unlock_secret.as_deref() else {
        error!("UNLOCK_SECRET is not configured");
        return Err(ApiError::unavailable("unlock_unconfigured").into());
    };

    if !constant_time_eq(request.secret.as_bytes(), expected.as_bytes()) {
        warn!(%key, "unlock rejected");
        return Err(ApiError::unauthorized("invalid_secret").into());
    }

    if let Err(err) = state.unlock_limiter.reset(&key).await {
        warn!(error = %err, %key, "failed to clear unlock attempts");
    }
    info!(%key, "unlock accepted");
    Ok(Json(UnlockResponse {
        ok: true,
        redirect: Some(state.config.unlock_redirect.clone()),
    }))
}
