//! Router assembly.

use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use super::{AppState, auth, lock, rbd};

/// API version prefixes; `v1.0` is an alias kept for older clients.
pub const API_PREFIXES: [&str; 2] = ["/api/v1", "/api/v1.0"];

/// Build the router: `/healthz` plus the authenticated API under each prefix.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new().route("/healthz", get(healthz));
    for prefix in API_PREFIXES {
        router = router.nest(prefix, api(state.clone()));
    }
    router.layer(TraceLayer::new_for_http())
}

fn api(state: AppState) -> Router {
    Router::new()
        .route("/rbd", post(rbd::create_rbd))
        .route("/rbd/", delete(rbd::delete_unnamed_rbd))
        .route("/rbd/{image_name}", delete(rbd::delete_rbd))
        .route("/lock", get(lock::list_locks))
        .route(
            "/lock/{image_name}/{lock_name}/{locker}",
            delete(lock::delete_lock),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth,
        ))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
