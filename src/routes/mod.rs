//! HTTP handlers of the admin API.
//!
//! - `health`: liveness, readiness, metrics and version
//! - `admin`: crawler status, recovery trigger and forced tree flush

pub mod admin;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/status", get(admin::status))
        .route("/recovery", post(admin::start_recovery))
        .route("/flush", post(admin::flush))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
