//! Crawl engine: a fixed pool of workers draining the work queue.
//!
//! Each task is walked on a blocking thread, its change events and follow-up
//! tasks are delivered, and only then is its tree batch committed and the
//! task acknowledged. A cancelled task leaves no trace in the tree store and
//! stays claimed on the queue, so the next start retries it in full.

pub mod diff;
pub mod walk;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::fs::FileHandle;
use crate::metrics::Metrics;
use crate::queue::{EventSink, WorkQueue};
use crate::rules::CrawlRules;
use crate::store::TreeStore;
use crate::types::{Action, ChangeEvent, CrawlTask, WorkerStatus};
pub use walk::{Resolution, TaskOutcome, Walker};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub crawl_delay: Duration,
    pub poll_interval: Duration,
    pub max_delivery_attempts: u32,
    pub retry_backoff: Duration,
    pub source_tag: String,
    pub acl_tokens: Vec<String>,
}

impl CrawlSettings {
    pub fn from_config(cfg: &CrawlerConfig) -> Self {
        Self {
            crawl_delay: Duration::from_millis(cfg.crawl_delay_ms),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            max_delivery_attempts: cfg.max_delivery_attempts,
            retry_backoff: Duration::from_millis(200),
            source_tag: cfg.source_tag.clone(),
            acl_tokens: cfg.acl_tokens.clone(),
        }
    }
}

/// Last folder each worker started on.
#[derive(Clone, Default)]
pub struct WorkerBoard {
    slots: Arc<Mutex<Vec<WorkerStatus>>>,
}

impl WorkerBoard {
    fn resize(&self, workers: usize) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        *slots = (0..workers)
            .map(|worker| WorkerStatus { worker, current: None, started_at: None })
            .collect();
    }

    fn set(&self, worker: usize, current: Option<String>) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get_mut(worker) {
            slot.started_at = current.as_ref().map(|_| chrono::Utc::now().to_rfc3339());
            slot.current = current;
        }
    }

    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Result of one processed task, as seen by the worker loop.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub resolution: Resolution,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub follow_ups: usize,
}

#[derive(Clone)]
pub struct Crawler {
    fs: Arc<dyn FileHandle>,
    store: Arc<TreeStore>,
    rules: Arc<CrawlRules>,
    queue: Arc<dyn WorkQueue>,
    sink: Arc<dyn EventSink>,
    metrics: Metrics,
    settings: Arc<CrawlSettings>,
    board: WorkerBoard,
    halted: Arc<AtomicBool>,
    /// Workers hold a read guard from pop to ack.
    gate: Arc<RwLock<()>>,
}

impl Crawler {
    pub fn new(
        fs: Arc<dyn FileHandle>,
        store: Arc<TreeStore>,
        rules: CrawlRules,
        queue: Arc<dyn WorkQueue>,
        sink: Arc<dyn EventSink>,
        metrics: Metrics,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            fs,
            store,
            rules: Arc::new(rules),
            queue,
            sink,
            metrics,
            settings: Arc::new(settings),
            board: WorkerBoard::default(),
            halted: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Set once a task exhausted its delivery retries.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Wait for tasks in flight to finish and keep the workers idle until the
    /// guard is dropped.
    pub async fn pause(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    pub fn workers(&self) -> Vec<WorkerStatus> {
        self.board.snapshot()
    }

    pub fn spawn_workers(&self, workers: usize, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.board.resize(workers);
        (0..workers)
            .map(|id| {
                let crawler = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { crawler.worker_loop(id, cancel).await })
            })
            .collect()
    }

    async fn worker_loop(self, id: usize, cancel: CancellationToken) {
        info!(worker = id, "Crawl worker started");
        loop {
            let gate = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                gate = self.gate.clone().read_owned() => gate,
            };
            let delivery = match self.queue.pop().await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    drop(gate);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.poll_interval) => continue,
                    }
                }
                Err(e) => {
                    drop(gate);
                    error!(worker = id, "Failed to read the work queue: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.poll_interval) => continue,
                    }
                }
            };

            // throttle towards the downstream queue
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.crawl_delay) => {}
            }

            let task = delivery.task;
            self.board.set(id, Some(task.path.folder_id()));
            info!(worker = id, path = %task.path, level = task.level, "Processing folder");

            let result = self.process(&task, &cancel).await;
            self.board.set(id, None);
            match result {
                Ok(report) => {
                    debug!(
                        worker = id,
                        path = %task.path,
                        resolution = ?report.resolution,
                        inserts = report.inserts,
                        updates = report.updates,
                        deletes = report.deletes,
                        follow_ups = report.follow_ups,
                        "Folder done"
                    );
                    self.acknowledge(delivery.receipt).await;
                }
                Err(CrawlError::Cancelled) => {
                    info!(worker = id, path = %task.path, "Task interrupted by shutdown, will be retried");
                    break;
                }
                Err(e @ CrawlError::DeliveryExhausted { .. }) => {
                    error!(worker = id, path = %task.path, "{}; stopping the crawler", e);
                    self.halted.store(true, Ordering::SeqCst);
                    cancel.cancel();
                    break;
                }
                Err(e) => {
                    warn!(worker = id, path = %task.path, "Task failed: {}", e);
                    self.acknowledge(delivery.receipt).await;
                }
            }
        }
        info!(worker = id, "Crawl worker stopped");
    }

    async fn acknowledge(&self, receipt: i64) {
        if let Err(e) = self.queue.ack(receipt).await {
            warn!(receipt, "Failed to acknowledge task: {}", e);
        }
    }

    /// Walk, deliver and commit one task. Does not touch the task's queue row.
    pub async fn process(&self, task: &CrawlTask, cancel: &CancellationToken) -> Result<TaskReport, CrawlError> {
        let walker = Walker::new(
            self.fs.clone(),
            self.store.clone(),
            self.rules.clone(),
            self.settings.clone(),
            cancel.clone(),
        );
        let owned = task.clone();
        let walked = tokio::task::spawn_blocking(move || walker.run(&owned))
            .await
            .map_err(|e| CrawlError::Store(format!("walker thread failed: {}", e)))?;

        let outcome = match walked {
            Ok(outcome) => outcome,
            Err(e) => {
                self.count_failure(&e);
                return Err(e);
            }
        };

        if let Err(e) = self.deliver(&outcome, cancel).await {
            self.count_failure(&e);
            return Err(e);
        }
        if cancel.is_cancelled() {
            self.metrics.inc_tasks_cancelled();
            return Err(CrawlError::Cancelled);
        }
        self.store.apply(&outcome.batch);

        let report = TaskReport {
            resolution: outcome.resolution,
            inserts: outcome.count(Action::Insert),
            updates: outcome.count(Action::Update),
            deletes: outcome.count(Action::Delete),
            follow_ups: outcome.follow_ups.len(),
        };
        self.metrics.inc_tasks_processed();
        self.metrics.add_inserts(report.inserts as u64);
        self.metrics.add_updates(report.updates as u64);
        self.metrics.add_deletes(report.deletes as u64);
        self.metrics.add_unchanged(outcome.unchanged);
        self.metrics.add_rejected(outcome.rejected);
        self.metrics.add_folders_enqueued(report.follow_ups as u64);
        for _ in 0..outcome.denied {
            self.metrics.inc_access_denied();
        }
        Ok(report)
    }

    /// Process queued tasks until the queue is empty. Used by one-shot runs.
    pub async fn drain(&self, cancel: &CancellationToken) -> Result<u64, CrawlError> {
        let mut done = 0;
        while let Some(delivery) = self.queue.pop().await? {
            match self.process(&delivery.task, cancel).await {
                Ok(_) => {}
                Err(e @ (CrawlError::Cancelled | CrawlError::DeliveryExhausted { .. })) => return Err(e),
                Err(e) => warn!(path = %delivery.task.path, "Task failed: {}", e),
            }
            self.queue.ack(delivery.receipt).await?;
            done += 1;
        }
        Ok(done)
    }

    fn count_failure(&self, e: &CrawlError) {
        match e {
            CrawlError::Cancelled => self.metrics.inc_tasks_cancelled(),
            _ => self.metrics.inc_tasks_failed(),
        }
    }

    /// Publish events, then push follow-up tasks. Failed deliveries share one
    /// budget per task.
    async fn deliver(&self, outcome: &TaskOutcome, cancel: &CancellationToken) -> Result<(), CrawlError> {
        let mut failures = 0u32;
        for event in &outcome.events {
            loop {
                if cancel.is_cancelled() {
                    return Err(CrawlError::Cancelled);
                }
                match self.sink.publish(event).await {
                    Ok(()) => {
                        audit(event);
                        break;
                    }
                    Err(e) => self.delivery_failed(&mut failures, &event.id, e, cancel).await?,
                }
            }
        }
        for task in &outcome.follow_ups {
            loop {
                if cancel.is_cancelled() {
                    return Err(CrawlError::Cancelled);
                }
                match self.queue.push(task).await {
                    Ok(()) => break,
                    Err(e) => self.delivery_failed(&mut failures, &task.path.folder_id(), e, cancel).await?,
                }
            }
        }
        Ok(())
    }

    async fn delivery_failed(
        &self,
        failures: &mut u32,
        id: &str,
        e: CrawlError,
        cancel: &CancellationToken,
    ) -> Result<(), CrawlError> {
        *failures += 1;
        if *failures > self.settings.max_delivery_attempts {
            return Err(CrawlError::DeliveryExhausted { attempts: *failures });
        }
        warn!(id = %id, attempt = *failures, "Queue delivery failed, retrying: {}", e);
        tokio::select! {
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
            _ = tokio::time::sleep(self.settings.retry_backoff * *failures) => Ok(()),
        }
    }
}

fn audit(event: &ChangeEvent) {
    match event.action {
        Action::Insert => info!(target: "edgecrawl::audit::inserts", id = %event.id, size = ?event.size, "insert"),
        Action::Update => info!(target: "edgecrawl::audit::updates", id = %event.id, size = ?event.size, "update"),
        Action::Delete => info!(target: "edgecrawl::audit::deletes", id = %event.id, "delete"),
    }
}
