use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::app_state::AppState;
use crate::handlers::{area, health, metrics, not_found, session};
use crate::middleware::authorize;
use crate::unlock::unlock;

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/api/unlock", post(unlock))
        .route("/account/session", get(session));
    for prefix in ["/admin", "/creator", "/godmode"] {
        router = router
            .route(prefix, get(area))
            .route(&format!("{prefix}/*rest"), get(area));
    }

    router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .with_state(state)
}
