use serde::{Deserialize, Serialize};

use crate::error::CrawlError;
use crate::path::CrawlPath;

/// Depth carried by tasks whose distance from a root is not known.
pub const UNKNOWN_DEPTH: u32 = 99;

/// One folder to crawl, `level` folders below the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub path: CrawlPath,
    pub level: u32,
}

// Wire form on the work queue
#[derive(Debug, Serialize, Deserialize)]
struct TaskMessage {
    id: String,
    level: u32,
}

impl CrawlTask {
    pub fn new(path: CrawlPath, level: u32) -> Self {
        Self { path, level }
    }

    pub fn to_message(&self) -> Result<String, CrawlError> {
        Ok(serde_json::to_string(&TaskMessage {
            id: self.path.folder_id(),
            level: self.level,
        })?)
    }

    pub fn from_message(raw: &str) -> Result<Self, CrawlError> {
        let msg: TaskMessage = serde_json::from_str(raw)?;
        Ok(Self {
            path: CrawlPath::parse(&msg.id)?,
            level: msg.level,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// A per-file change record for the downstream indexing queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub id: String,
    pub action: Action,
    pub title: String,
    pub mime_type: String,
    pub last_modified: Option<i64>,
    pub size: Option<u64>,
    pub source_tag: String,
    pub access_control_tokens: Vec<String>,
    /// Where the indexer fetches the content from; absent for deletes.
    pub data_reference: Option<String>,
}

impl ChangeEvent {
    pub fn upsert(
        action: Action,
        path: &CrawlPath,
        last_modified: i64,
        size: u64,
        source_tag: &str,
        access_control_tokens: Vec<String>,
    ) -> Self {
        let id = path.file_id();
        Self {
            title: path.name().to_string(),
            mime_type: mime_guess::from_path(path.name()).first_or_octet_stream().essence_str().to_string(),
            last_modified: Some(last_modified),
            size: Some(size),
            source_tag: source_tag.to_string(),
            access_control_tokens,
            data_reference: Some(id.clone()),
            id,
            action,
        }
    }

    pub fn delete(path: &CrawlPath, source_tag: &str) -> Self {
        Self {
            id: path.file_id(),
            action: Action::Delete,
            title: path.name().to_string(),
            mime_type: mime_guess::from_path(path.name()).first_or_octet_stream().essence_str().to_string(),
            last_modified: None,
            size: None,
            source_tag: source_tag.to_string(),
            access_control_tokens: Vec::new(),
            data_reference: None,
        }
    }
}

/// `{id, lastModified}` pair read from the authoritative index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub id: String,
    pub last_modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker: usize,
    pub current: Option<String>,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDto {
    pub queue_depth: i64,
    pub branches: u64,
    pub leaves: u64,
    pub dirty: bool,
    pub halted: bool,
    pub recovery_mode: bool,
    pub seeded: bool,
    pub workers: Vec<WorkerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub purged: u64,
    pub records: u64,
    pub folders: u64,
    pub enqueued: u64,
    pub audit_file: Option<String>,
}
