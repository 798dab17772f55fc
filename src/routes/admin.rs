use std::sync::atomic::Ordering;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::recovery::{Recovery, SolrIndex};
use crate::state::AppState;
use crate::types::{RecoveryReport, StatusDto};

pub async fn status(State(state): State<AppState>) -> AppResult<Json<StatusDto>> {
    let queue_depth = state.queue.len().await?;
    let tree = state.store.stats();
    Ok(Json(StatusDto {
        queue_depth,
        branches: tree.branches,
        leaves: tree.leaves,
        dirty: tree.dirty,
        halted: state.crawler.is_halted(),
        recovery_mode: state.crawler_state.recovery_mode(),
        seeded: state.crawler_state.is_seeded(),
        workers: state.crawler.workers(),
    }))
}

/// Operator-triggered rebuild of the work queue from the index. Workers are
/// paused for the run so no task in flight writes into the discarded tree.
pub async fn start_recovery(State(state): State<AppState>) -> AppResult<Json<RecoveryReport>> {
    if state.recovery_running.swap(true, Ordering::SeqCst) {
        return Err(AppError::Conflict("a recovery run is already in progress".into()));
    }
    state.crawler_state.set_recovery_mode(true);
    let paused = state.crawler.pause().await;
    tracing::info!("Crawl workers paused for recovery");

    let result = async {
        let mut source = SolrIndex::new(&state.config.recovery)?;
        Recovery::new(
            state.queue.clone(),
            state.store.clone(),
            state.metrics.clone(),
            state.config.recovery.collection.clone(),
            state.config.recovery.audit_dir.clone(),
        )
        .run(&mut source)
        .await
    }
    .await;

    drop(paused);
    state.recovery_running.store(false, Ordering::SeqCst);
    match result {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            state.crawler_state.set_recovery_mode(false);
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub written: bool,
    pub path: Option<String>,
}

pub async fn flush(State(state): State<AppState>) -> AppResult<Json<FlushResponse>> {
    if state.store.path().is_none() {
        return Err(AppError::BadRequest("the tree store has no durable file".into()));
    }
    let written = state.store.flush_if_dirty().await?;
    if written {
        state.metrics.inc_tree_flushes();
    }
    Ok(Json(FlushResponse {
        written,
        path: state.store.path().map(|p| p.display().to_string()),
    }))
}
