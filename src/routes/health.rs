use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Liveness probe
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: the queues live in SQLite, so check it with a timeout
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.crawler.is_halted() {
        return (StatusCode::SERVICE_UNAVAILABLE, "not ready: crawler halted").into_response();
    }
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let series: [(&str, &str, &str, u64); 13] = [
        ("tasks_processed", "Crawl tasks completed", "counter", m.tasks_processed),
        ("tasks_failed", "Crawl tasks failed", "counter", m.tasks_failed),
        ("tasks_cancelled", "Crawl tasks interrupted by shutdown", "counter", m.tasks_cancelled),
        ("access_denied", "Folders skipped for missing permissions", "counter", m.access_denied),
        ("inserts", "Insert events emitted", "counter", m.inserts),
        ("updates", "Update events emitted", "counter", m.updates),
        ("deletes", "Delete events emitted", "counter", m.deletes),
        ("unchanged", "Files found unchanged", "counter", m.unchanged),
        ("rejected", "Files rejected by crawl rules", "counter", m.rejected),
        ("folders_enqueued", "Folders pushed onto the work queue", "counter", m.folders_enqueued),
        ("tree_flushes", "Tree store flushes", "counter", m.tree_flushes),
        ("recoveries", "Recovery runs", "counter", m.recoveries),
        ("uptime_seconds", "Uptime seconds", "gauge", m.uptime_seconds),
    ];
    let mut body = String::new();
    for (name, help, kind, value) in series {
        body.push_str(&format!(
            "# HELP edgecrawl_{name} {help}\n# TYPE edgecrawl_{name} {kind}\nedgecrawl_{name} {value}\n"
        ));
    }
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
