use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
    Json,
};
use common_auth::AuthenticatedUser;
use common_http_errors::ApiError;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::GatewayMetrics;
use crate::middleware::USER_ID_HEADER;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(metrics): State<Arc<GatewayMetrics>>) -> Result<Response, ApiError> {
    metrics
        .render()
        .map_err(|err| ApiError::internal(err, Some(Uuid::new_v4())))
}

/// Who the gateway thinks the caller is.
pub async fn session(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

/// Landing for each protected area. Reports the identity as forwarded downstream.
pub async fn area(uri: Uri, headers: HeaderMap, user: AuthenticatedUser) -> Json<Value> {
    let forwarded_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    Json(json!({
        "path": uri.path(),
        "user": forwarded_id,
        "role": user.role,
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound {
        code: "not_found",
        trace_id: None,
    }
}
