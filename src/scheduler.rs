use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CrawlError;
use crate::metrics::Metrics;
use crate::path::CrawlPath;
use crate::queue::WorkQueue;
use crate::store::TreeStore;
use crate::types::CrawlTask;

/// Scheduling flags shared by the scheduler, the recovery endpoint and the
/// status endpoint.
#[derive(Debug, Default)]
pub struct CrawlerState {
    seeded: AtomicBool,
    recovery_mode: AtomicBool,
}

impl CrawlerState {
    pub fn new(recovery_mode: bool) -> Self {
        Self {
            seeded: AtomicBool::new(false),
            recovery_mode: AtomicBool::new(recovery_mode),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded.load(Ordering::SeqCst)
    }

    pub fn recovery_mode(&self) -> bool {
        self.recovery_mode.load(Ordering::SeqCst)
    }

    pub fn set_recovery_mode(&self, on: bool) {
        self.recovery_mode.store(on, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(usize),
    SkippedRecovery,
    SkippedBusy,
    AlreadySeeded,
}

pub struct Scheduler {
    state: Arc<CrawlerState>,
    queue: Arc<dyn WorkQueue>,
    roots: Vec<CrawlPath>,
    refresh_interval: Duration,
}

impl Scheduler {
    pub fn new(
        state: Arc<CrawlerState>,
        queue: Arc<dyn WorkQueue>,
        roots: Vec<CrawlPath>,
        refresh_interval: Duration,
    ) -> Self {
        Self { state, queue, roots, refresh_interval }
    }

    /// Parse configured root strings, skipping the ones that do not parse.
    pub fn parse_roots(raw: &[String]) -> Vec<CrawlPath> {
        raw.iter()
            .filter_map(|r| match CrawlPath::parse(r) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(root = %r, "Ignoring root: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Push every root at level 0 unless recovery owns the queue or a crawl
    /// is still in progress.
    pub async fn seed(&self) -> Result<SeedOutcome, CrawlError> {
        if self.state.recovery_mode() {
            let pending = self.queue.len().await?;
            if pending > 0 {
                debug!(pending, "Recovery mode, not seeding roots");
                return Ok(SeedOutcome::SkippedRecovery);
            }
            info!("Recovery pass drained the work queue, resuming refresh cycles");
            self.state.set_recovery_mode(false);
        }
        let pending = self.queue.len().await?;
        if pending > 0 {
            debug!(pending, "Crawl still in progress, not seeding roots");
            return Ok(SeedOutcome::SkippedBusy);
        }
        for root in &self.roots {
            self.queue.push(&CrawlTask::new(root.clone(), 0)).await?;
            info!(root = %root, "Seeded root");
        }
        self.state.seeded.store(true, Ordering::SeqCst);
        Ok(SeedOutcome::Seeded(self.roots.len()))
    }

    /// Startup seeding, at most once per process.
    pub async fn seed_once(&self) -> Result<SeedOutcome, CrawlError> {
        if self.state.is_seeded() {
            return Ok(SeedOutcome::AlreadySeeded);
        }
        self.seed().await
    }

    /// Seed at startup and then on every refresh interval.
    pub async fn run(self, cancel: CancellationToken) {
        match self.seed_once().await {
            Ok(outcome) => info!(?outcome, "Startup seeding"),
            Err(e) => error!("Startup seeding failed: {}", e),
        }
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.seed().await {
                        Ok(outcome) => debug!(?outcome, "Refresh cycle"),
                        Err(e) => error!("Refresh seeding failed: {}", e),
                    }
                }
            }
        }
        debug!("Scheduler stopped");
    }
}

/// Flush the tree store whenever it is dirty, and once more on shutdown.
pub async fn run_flusher(store: Arc<TreeStore>, interval: Duration, metrics: Metrics, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => flush(&store, &metrics).await,
        }
    }
    flush(&store, &metrics).await;
    info!("Tree store flushed on shutdown");
}

pub async fn flush(store: &TreeStore, metrics: &Metrics) {
    match store.flush_if_dirty().await {
        Ok(true) => metrics.inc_tree_flushes(),
        Ok(false) => {}
        Err(e) => error!("Failed to flush tree store: {}", e),
    }
}
