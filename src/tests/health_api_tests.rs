#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::db::init_db;
    use crate::fs::mem::MemFs;
    use crate::path::CrawlPath;
    use crate::queue::mem::{MemQueue, MemSink};
    use crate::queue::WorkQueue;
    use crate::routes;
    use crate::state::AppState;
    use crate::store::{LeafEntry, TreeStore};
    use crate::types::CrawlTask;

    async fn setup_state(config: AppConfig, store: TreeStore) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        AppState::with_parts(
            pool,
            config,
            Arc::new(store),
            Arc::new(MemFs::new()),
            Arc::new(MemQueue::new()),
            Arc::new(MemSink::new()),
        )
        .unwrap()
    }

    async fn setup_test_app() -> (Router, AppState) {
        let state = setup_state(AppConfig::default(), TreeStore::in_memory()).await;
        (routes::router(state.clone()), state)
    }

    async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> serde_json::Value {
        let (status, body) = send(app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (app, _) = setup_test_app().await;
        let (status, body) = send(&app, Method::GET, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let (app, _) = setup_test_app().await;
        let v = get_json(&app, "/version").await;
        assert_eq!(v["name"], "edgecrawl");
        assert!(!v["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readyz_endpoint_ok() {
        let (app, _) = setup_test_app().await;
        let (status, body) = send(&app, Method::GET, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ready");
    }

    #[tokio::test]
    async fn test_metrics_endpoints() {
        let (app, state) = setup_test_app().await;
        state.metrics.add_inserts(3);

        let v = get_json(&app, "/metrics").await;
        assert_eq!(v["inserts"], 3);
        assert_eq!(v["tasks_processed"], 0);

        let (status, body) = send(&app, Method::GET, "/metrics/prometheus").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("# TYPE edgecrawl_tasks_processed counter"));
        assert!(text.contains("edgecrawl_inserts 3"));
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (app, state) = setup_test_app().await;
        state
            .queue
            .push(&CrawlTask::new(CrawlPath::parse("/srv").unwrap(), 0))
            .await
            .unwrap();
        state.store.insert_leaves(&[LeafEntry {
            parent: CrawlPath::parse("/srv").unwrap(),
            name: "a.txt".into(),
            last_modified: 1,
            size: 1,
        }]);

        let v = get_json(&app, "/status").await;
        assert_eq!(v["queue_depth"], 1);
        assert_eq!(v["leaves"], 1);
        assert_eq!(v["dirty"], true);
        assert_eq!(v["halted"], false);
        assert_eq!(v["recovery_mode"], false);
        assert!(v["workers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_without_durable_file_is_rejected() {
        let (app, _) = setup_test_app().await;
        let (status, body) = send(&app, Method::POST, "/flush").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_flush_writes_tree_file() {
        let dir = tempfile::tempdir().unwrap();
        let file: PathBuf = dir.path().join("crate.msgpack");
        let state = setup_state(AppConfig::default(), TreeStore::empty_at(&file)).await;
        state.store.insert_branches(&[CrawlPath::parse("/srv").unwrap()].into_iter().collect());
        let app = routes::router(state.clone());

        let (status, body) = send(&app, Method::POST, "/flush").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["written"], true);
        assert!(file.exists());

        let (_, body) = send(&app, Method::POST, "/flush").await;
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["written"], false);
        assert_eq!(state.metrics.get_snapshot().tree_flushes, 1);
    }

    #[tokio::test]
    async fn test_recovery_conflict_while_running() {
        let (app, state) = setup_test_app().await;
        state.recovery_running.store(true, Ordering::SeqCst);
        let (status, _) = send(&app, Method::POST, "/recovery").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_recovery_with_unreachable_index() {
        let mut config = AppConfig::default();
        config.recovery.index_url = "http://127.0.0.1:1/solr".to_string();
        config.recovery.audit_dir = None;
        let state = setup_state(config, TreeStore::in_memory()).await;
        let app = routes::router(state.clone());

        let (status, body) = send(&app, Method::POST, "/recovery").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"]["code"], "CRAWLER_ERROR");
        assert!(!state.crawler_state.recovery_mode());
        assert!(!state.recovery_running.load(Ordering::SeqCst));
    }
}
