//! The tree store ("crate"): the last known state of every crawled folder,
//! shared by all workers and periodically written to disk.
//!
//! Mutations arrive as one [`TreeBatch`] per finished crawl task and are
//! serialized through a single lock. The flusher takes the same lock to
//! encode a consistent snapshot, and only when the dirty flag is set.

mod tree;

pub use tree::{Branch, BranchView, Leaf, LeafEntry, Node, Subtree, TreeBatch};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::path::CrawlPath;
use tree::Forest;

const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TreeFile {
    version: u32,
    saved_at: String,
    forest: Forest,
}

#[derive(Default)]
struct TreeInner {
    forest: Forest,
    dirty: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeStats {
    pub branches: u64,
    pub leaves: u64,
    pub dirty: bool,
}

pub struct TreeStore {
    inner: Mutex<TreeInner>,
    path: Option<PathBuf>,
}

impl TreeStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(TreeInner::default()),
            path: None,
        }
    }

    /// An empty store that flushes to `path` without reading it.
    pub fn empty_at(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(TreeInner::default()),
            path: Some(path.into()),
        }
    }

    /// Load the durable tree from `path`, or start empty when there is none.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CrawlError> {
        let path = path.into();
        let forest = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: TreeFile = rmp_serde::from_slice(&bytes).map_err(|e| {
                    CrawlError::Store(format!(
                        "tree file {} is unreadable ({}); run `edgecrawl recover` to rebuild it",
                        path.display(),
                        e
                    ))
                })?;
                if file.version != FILE_VERSION {
                    return Err(CrawlError::Store(format!(
                        "tree file {} has version {}, expected {}",
                        path.display(),
                        file.version,
                        FILE_VERSION
                    )));
                }
                info!(path = %path.display(), saved_at = %file.saved_at, "Loaded tree store");
                file.forest
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No tree file found, starting with an empty tree");
                Forest::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner: Mutex::new(TreeInner { forest, dirty: false }),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, TreeInner> {
        // a panicking writer leaves the tree as consistent as any single batch
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_branches(&self, paths: &BTreeSet<CrawlPath>) {
        if paths.is_empty() {
            return;
        }
        let mut inner = self.lock();
        for path in paths {
            inner.forest.insert_branch(path);
        }
        inner.dirty = true;
    }

    pub fn insert_leaves(&self, entries: &[LeafEntry]) {
        if entries.is_empty() {
            return;
        }
        let mut inner = self.lock();
        for entry in entries {
            inner.forest.insert_leaf(entry);
        }
        inner.dirty = true;
    }

    pub fn delete_nodes(&self, paths: &BTreeSet<CrawlPath>) {
        let mut inner = self.lock();
        let mut changed = false;
        for path in paths {
            changed |= inner.forest.delete(path);
        }
        inner.dirty |= changed;
    }

    /// Apply a task's mutations atomically: deletes, then branches, then leaves.
    pub fn apply(&self, batch: &TreeBatch) {
        if batch.is_empty() {
            return;
        }
        let mut inner = self.lock();
        let changed = inner.forest.apply(batch);
        inner.dirty |= changed;
        debug!(
            deletes = batch.deletes.len(),
            branches = batch.branches.len(),
            leaves = batch.leaves.len(),
            "Applied tree batch"
        );
    }

    pub fn lookup(&self, path: &CrawlPath) -> Option<Node> {
        self.lock().forest.lookup(path)
    }

    pub fn lookup_branch(&self, path: &CrawlPath) -> Option<BranchView> {
        self.lock().forest.branch(path).map(tree::view)
    }

    pub fn subtree(&self, path: &CrawlPath) -> Option<Subtree> {
        self.lock().forest.subtree(path)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn stats(&self) -> TreeStats {
        let inner = self.lock();
        let (branches, leaves) = inner.forest.counts();
        TreeStats { branches, leaves, dirty: inner.dirty }
    }

    /// Write the tree if it changed since the last flush. Returns whether a
    /// file was written.
    pub async fn flush_if_dirty(&self) -> Result<bool, CrawlError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };

        let bytes = {
            let mut inner = self.lock();
            if !inner.dirty {
                return Ok(false);
            }
            let file = TreeFileRef {
                version: FILE_VERSION,
                saved_at: chrono::Utc::now().to_rfc3339(),
                forest: &inner.forest,
            };
            let bytes = rmp_serde::to_vec_named(&file)?;
            inner.dirty = false;
            bytes
        };

        if let Err(e) = write_atomic(path, &bytes).await {
            // keep the changes pending for the next attempt
            self.lock().dirty = true;
            return Err(e);
        }
        debug!(path = %path.display(), bytes = bytes.len(), "Flushed tree store");
        Ok(true)
    }

    /// Forget the in-memory tree and remove the durable file.
    pub async fn discard(&self) -> Result<(), CrawlError> {
        {
            let mut inner = self.lock();
            inner.forest = Forest::default();
            inner.dirty = false;
        }
        if let Some(path) = self.path.as_deref() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "Removed tree file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), "Failed to remove tree file: {}", e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TreeFileRef<'a> {
    version: u32,
    saved_at: String,
    forest: &'a Forest,
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CrawlError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
