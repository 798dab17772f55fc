use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::crawler::{CrawlSettings, Crawler};
use crate::fs::{FileHandle, FileSystems, LocalFs, ShareFs};
use crate::metrics::Metrics;
use crate::queue::{EventSink, SqliteEventSink, SqliteWorkQueue, WorkQueue};
use crate::rules::CrawlRules;
use crate::scheduler::CrawlerState;
use crate::store::TreeStore;

/// The shared application state.
///
/// Holds everything the admin routes and the background services need:
/// the database pool backing both queues, the tree store, the crawl engine
/// and the scheduling flags.
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    pub store: Arc<TreeStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub crawler: Crawler,
    pub crawler_state: Arc<CrawlerState>,
    /// Set while a recovery run owns the work queue.
    pub recovery_running: Arc<AtomicBool>,
    /// Stops workers, scheduler and flusher.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the crawl engine to SQLite queues and the real file systems.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig, store: Arc<TreeStore>) -> anyhow::Result<Self> {
        let fs: Arc<dyn FileHandle> = Arc::new(FileSystems::new(
            Arc::new(LocalFs::new()),
            Arc::new(ShareFs::new(config.share.clone())),
        ));
        let queue: Arc<dyn WorkQueue> = Arc::new(SqliteWorkQueue::new(db.clone()));
        let sink: Arc<dyn EventSink> = Arc::new(SqliteEventSink::new(db.clone()));
        Self::with_parts(db, config, store, fs, queue, sink)
    }

    pub fn with_parts(
        db: sqlx::SqlitePool,
        config: AppConfig,
        store: Arc<TreeStore>,
        fs: Arc<dyn FileHandle>,
        queue: Arc<dyn WorkQueue>,
        sink: Arc<dyn EventSink>,
    ) -> anyhow::Result<Self> {
        let rules = CrawlRules::from_config(&config.rules)?;
        let metrics = Metrics::new();
        let crawler = Crawler::new(
            fs,
            store.clone(),
            rules,
            queue.clone(),
            sink,
            metrics.clone(),
            CrawlSettings::from_config(&config.crawler),
        );
        Ok(Self {
            db,
            crawler_state: Arc::new(CrawlerState::new(config.crawler.recovery_mode)),
            config: Arc::new(config),
            metrics,
            store,
            queue,
            crawler,
            recovery_running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        })
    }
}
