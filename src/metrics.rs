use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Crawl counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub tasks_processed: Arc<AtomicU64>,
    pub tasks_failed: Arc<AtomicU64>,
    pub tasks_cancelled: Arc<AtomicU64>,
    pub access_denied: Arc<AtomicU64>,
    pub inserts: Arc<AtomicU64>,
    pub updates: Arc<AtomicU64>,
    pub deletes: Arc<AtomicU64>,
    pub unchanged: Arc<AtomicU64>,
    pub rejected: Arc<AtomicU64>,
    pub folders_enqueued: Arc<AtomicU64>,
    pub tree_flushes: Arc<AtomicU64>,
    pub recoveries: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tasks_processed: Arc::new(AtomicU64::new(0)),
            tasks_failed: Arc::new(AtomicU64::new(0)),
            tasks_cancelled: Arc::new(AtomicU64::new(0)),
            access_denied: Arc::new(AtomicU64::new(0)),
            inserts: Arc::new(AtomicU64::new(0)),
            updates: Arc::new(AtomicU64::new(0)),
            deletes: Arc::new(AtomicU64::new(0)),
            unchanged: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            folders_enqueued: Arc::new(AtomicU64::new(0)),
            tree_flushes: Arc::new(AtomicU64::new(0)),
            recoveries: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_tasks_processed(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inserts(&self, count: u64) {
        self.inserts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_updates(&self, count: u64) {
        self.updates.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_unchanged(&self, count: u64) {
        self.unchanged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_rejected(&self, count: u64) {
        self.rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_folders_enqueued(&self, count: u64) {
        self.folders_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_tree_flushes(&self) {
        self.tree_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recoveries(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            folders_enqueued: self.folders_enqueued.load(Ordering::Relaxed),
            tree_flushes: self.tree_flushes.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub access_denied: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub unchanged: u64,
    pub rejected: u64,
    pub folders_enqueued: u64,
    pub tree_flushes: u64,
    pub recoveries: u64,
    pub uptime_seconds: u64,
}
