//! Rebuild of the work queue from the authoritative index.
//!
//! The queue is purged, the tree store discarded, and every folder that
//! holds an indexed document is queued at [`UNKNOWN_DEPTH`]. The tree is not
//! rebuilt from the index; workers repopulate it from live listings.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::RecoveryConfig;
use crate::error::CrawlError;
use crate::metrics::Metrics;
use crate::path::CrawlPath;
use crate::queue::WorkQueue;
use crate::store::TreeStore;
use crate::types::{CrawlTask, RecoveryReport, RecoverySnapshot, UNKNOWN_DEPTH};

/// A paged export of `{id, lastModified}` records.
#[async_trait]
pub trait IndexSource: Send {
    /// Next page, `None` once the export is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<RecoverySnapshot>>, CrawlError>;
}

/// Solr cursor-mark export of `id` and `last_modified`.
pub struct SolrIndex {
    client: reqwest::Client,
    select_url: String,
    rows: usize,
    cursor: String,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct SolrResponse {
    response: SolrDocs,
    #[serde(rename = "nextCursorMark")]
    next_cursor_mark: String,
}

#[derive(Debug, Deserialize)]
struct SolrDocs {
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize)]
struct SolrDoc {
    id: String,
    #[serde(default)]
    last_modified: Option<serde_json::Value>,
}

impl SolrIndex {
    pub fn new(cfg: &RecoveryConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            select_url: format!("{}/{}/select", cfg.index_url.trim_end_matches('/'), cfg.collection),
            rows: cfg.page_size,
            cursor: "*".to_string(),
            done: false,
        })
    }
}

#[async_trait]
impl IndexSource for SolrIndex {
    async fn next_page(&mut self) -> Result<Option<Vec<RecoverySnapshot>>, CrawlError> {
        if self.done {
            return Ok(None);
        }
        let rows = self.rows.to_string();
        let resp = self
            .client
            .get(&self.select_url)
            .query(&[
                ("q", "*:*"),
                ("fl", "id,last_modified"),
                ("sort", "id asc"),
                ("rows", rows.as_str()),
                ("cursorMark", self.cursor.as_str()),
                ("wt", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: SolrResponse = resp.json().await?;

        if body.next_cursor_mark == self.cursor {
            self.done = true;
        }
        self.cursor = body.next_cursor_mark;
        if body.response.docs.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(
            body.response
                .docs
                .into_iter()
                .map(|d| RecoverySnapshot {
                    last_modified: d.last_modified.as_ref().map(parse_index_date).unwrap_or(0),
                    id: d.id,
                })
                .collect(),
        ))
    }
}

/// `yyyy-MM-ddTHH:mm:ssZ` (or a list holding one) to epoch millis, 0 when unparseable.
pub fn parse_index_date(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|d| d.timestamp_millis())
            .unwrap_or(0),
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::Array(items) => items.first().map(parse_index_date).unwrap_or(0),
        _ => 0,
    }
}

/// Folders to queue for the given parent folders: greatest first, skipping
/// any folder whose descendant is already queued.
pub fn plan_folders(folders: &BTreeSet<CrawlPath>) -> Vec<CrawlPath> {
    let mut planned: Vec<CrawlPath> = Vec::new();
    for folder in folders.iter().rev() {
        // descendants sort directly after their ancestor, so the last
        // queued folder is the only one that can cover this one
        if planned.last().is_some_and(|prev| folder.is_ancestor_of(prev)) {
            continue;
        }
        planned.push(folder.clone());
    }
    planned
}

pub struct Recovery {
    queue: Arc<dyn WorkQueue>,
    store: Arc<TreeStore>,
    metrics: Metrics,
    collection: String,
    audit_dir: Option<PathBuf>,
}

impl Recovery {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<TreeStore>,
        metrics: Metrics,
        collection: String,
        audit_dir: Option<PathBuf>,
    ) -> Self {
        Self { queue, store, metrics, collection, audit_dir }
    }

    pub async fn run(&self, source: &mut dyn IndexSource) -> Result<RecoveryReport, CrawlError> {
        info!(collection = %self.collection, "Recovery started");
        let purged = self.queue.purge().await?;
        info!(purged, "Purged work queue");
        self.store.discard().await?;

        let audit_path = self
            .audit_dir
            .as_ref()
            .map(|dir| dir.join(format!("rebuild_{}.jsonl", self.collection)));
        let mut audit = match &audit_path {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    tokio::fs::create_dir_all(dir).await?;
                }
                Some(tokio::io::BufWriter::new(tokio::fs::File::create(path).await?))
            }
            None => None,
        };

        let mut records = 0u64;
        let mut folders: BTreeSet<CrawlPath> = BTreeSet::new();
        while let Some(page) = source.next_page().await? {
            for snapshot in page {
                records += 1;
                if let Some(out) = audit.as_mut() {
                    let mut line = serde_json::to_vec(&serde_json::json!({
                        "id": snapshot.id,
                        "lastmod": snapshot.last_modified,
                    }))?;
                    line.push(b'\n');
                    out.write_all(&line).await?;
                }
                match CrawlPath::parse(&snapshot.id) {
                    Ok(doc) => match doc.parent() {
                        Some(parent) => {
                            folders.insert(parent);
                        }
                        None => debug!(id = %snapshot.id, "Indexed id has no parent folder"),
                    },
                    Err(e) => warn!(id = %snapshot.id, "Skipping indexed id: {}", e),
                }
            }
            debug!(records, folders = folders.len(), "Read index page");
        }
        if let Some(mut out) = audit {
            out.flush().await?;
        }

        let planned = plan_folders(&folders);
        for folder in &planned {
            self.queue.push(&CrawlTask::new(folder.clone(), UNKNOWN_DEPTH)).await?;
        }
        self.metrics.inc_recoveries();
        self.metrics.add_folders_enqueued(planned.len() as u64);
        info!(records, folders = folders.len(), enqueued = planned.len(), "Recovery finished");

        Ok(RecoveryReport {
            purged,
            records,
            folders: folders.len() as u64,
            enqueued: planned.len() as u64,
            audit_file: audit_path.map(|p| p.display().to_string()),
        })
    }
}
