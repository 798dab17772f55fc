//! The per-task state machine: resolve the folder, then walk at most two
//! levels of it and hand deeper folders back to the work queue.

use std::io;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::diff::classify;
use super::CrawlSettings;
use crate::error::CrawlError;
use crate::fs::{EntryMeta, FileHandle};
use crate::path::CrawlPath;
use crate::rules::CrawlRules;
use crate::store::{BranchView, LeafEntry, TreeBatch, TreeStore};
use crate::types::{Action, ChangeEvent, CrawlTask, UNKNOWN_DEPTH};

/// Folder levels walked inside one task; deeper folders become new tasks.
pub const INLINE_DEPTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    NewFolder,
    KnownFolder,
    Vanished,
    DemotedToFile,
    AccessDenied,
    Unreachable,
    NotAFolder,
    Excluded,
}

/// Everything a task produced. Nothing is visible to others until the
/// engine delivers the events and applies the batch.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub resolution: Resolution,
    pub events: Vec<ChangeEvent>,
    pub follow_ups: Vec<CrawlTask>,
    pub batch: TreeBatch,
    pub unchanged: u64,
    pub rejected: u64,
    pub denied: u64,
}

impl TaskOutcome {
    fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            events: Vec::new(),
            follow_ups: Vec::new(),
            batch: TreeBatch::default(),
            unchanged: 0,
            rejected: 0,
            denied: 0,
        }
    }

    pub fn count(&self, action: Action) -> usize {
        self.events.iter().filter(|e| e.action == action).count()
    }
}

pub struct Walker {
    fs: Arc<dyn FileHandle>,
    store: Arc<TreeStore>,
    rules: Arc<CrawlRules>,
    settings: Arc<CrawlSettings>,
    cancel: CancellationToken,
}

impl Walker {
    pub fn new(
        fs: Arc<dyn FileHandle>,
        store: Arc<TreeStore>,
        rules: Arc<CrawlRules>,
        settings: Arc<CrawlSettings>,
        cancel: CancellationToken,
    ) -> Self {
        Self { fs, store, rules, settings, cancel }
    }

    fn checkpoint(&self) -> Result<(), CrawlError> {
        if self.cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        Ok(())
    }

    /// Run one task to completion. Blocks on file system I/O.
    pub fn run(&self, task: &CrawlTask) -> Result<TaskOutcome, CrawlError> {
        self.checkpoint()?;
        let path = &task.path;

        let meta = match self.fs.stat(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(path = %path, "Access denied, keeping last known state");
                let mut out = TaskOutcome::new(Resolution::AccessDenied);
                out.denied = 1;
                return Ok(out);
            }
            Err(e) => {
                warn!(path = %path, "Folder unreachable, keeping last known state: {}", e);
                return Ok(TaskOutcome::new(Resolution::Unreachable));
            }
        };

        match meta {
            None if !self.share_reachable(path) => {
                warn!(path = %path, "Share unreachable, keeping last known state");
                Ok(TaskOutcome::new(Resolution::Unreachable))
            }
            None => {
                let mut out = TaskOutcome::new(Resolution::Vanished);
                if self.store.lookup_branch(path).is_some() {
                    info!(path = %path, "Folder vanished, deleting known subtree");
                    self.delete_subtree(path, &mut out);
                } else {
                    debug!(path = %path, "Queued folder does not exist");
                }
                Ok(out)
            }
            Some(meta) if !meta.is_dir => {
                if self.store.lookup_branch(path).is_none() {
                    debug!(path = %path, "Queued path is a file, ignoring");
                    return Ok(TaskOutcome::new(Resolution::NotAFolder));
                }
                info!(path = %path, "Folder was replaced by a file");
                let mut out = TaskOutcome::new(Resolution::DemotedToFile);
                self.delete_subtree(path, &mut out);
                if let Some(parent) = path.parent() {
                    if self.rules.accepts_file(path, meta.size) {
                        self.emit_upsert(Action::Insert, &parent, &meta, &mut out);
                    } else {
                        out.rejected += 1;
                    }
                }
                Ok(out)
            }
            Some(_) if !self.rules.accepts_folder(path) => {
                debug!(path = %path, "Folder excluded by crawl rules");
                Ok(TaskOutcome::new(Resolution::Excluded))
            }
            Some(_) => {
                let known = self.store.lookup_branch(path);
                let resolution = if known.is_some() { Resolution::KnownFolder } else { Resolution::NewFolder };
                let mut out = TaskOutcome::new(resolution);
                match self.walk(path, known, 0, task.level, &mut out) {
                    Err(CrawlError::AccessDenied(msg)) => {
                        warn!(path = %path, "Access denied, keeping last known state: {}", msg);
                        let mut out = TaskOutcome::new(Resolution::AccessDenied);
                        out.denied = 1;
                        Ok(out)
                    }
                    Err(CrawlError::Io(e)) => {
                        warn!(path = %path, "Listing failed, keeping last known state: {}", e);
                        Ok(TaskOutcome::new(Resolution::Unreachable))
                    }
                    Err(e) => Err(e),
                    Ok(()) => Ok(out),
                }
            }
        }
    }

    /// A missing share path only counts as gone while its share still
    /// answers. An unmounted or offline share looks like a missing folder.
    fn share_reachable(&self, path: &CrawlPath) -> bool {
        let Some(root) = path.share_root() else {
            return true;
        };
        if root == *path {
            return false;
        }
        matches!(self.fs.stat(&root), Ok(Some(meta)) if meta.is_dir)
    }

    /// Walk `folder` found `depth` levels below the task folder.
    fn walk(
        &self,
        folder: &CrawlPath,
        known: Option<BranchView>,
        depth: u32,
        level: u32,
        out: &mut TaskOutcome,
    ) -> Result<(), CrawlError> {
        self.checkpoint()?;

        let entries = match self.fs.list(folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                if depth == 0 {
                    return Err(CrawlError::AccessDenied(e.to_string()));
                }
                warn!(path = %folder, "Access denied, keeping last known state");
                out.denied += 1;
                return Ok(());
            }
            Err(e) if depth == 0 => return Err(e.into()),
            Err(e) => {
                warn!(path = %folder, "Listing failed, keeping last known state: {}", e);
                return Ok(());
            }
        };

        let known_leaves = known.as_ref().map(|k| k.leaves.as_slice()).unwrap_or(&[]);
        let diff = classify(folder, &entries, known_leaves, &self.rules);

        for file in &diff.insert {
            self.emit_upsert(Action::Insert, folder, file, out);
        }
        for file in &diff.update {
            self.emit_upsert(Action::Update, folder, file, out);
        }
        for file in &diff.unchanged {
            trace!(target: "edgecrawl::audit::unchanged", id = %folder.child(&file.name), "unchanged");
        }
        out.unchanged += diff.unchanged.len() as u64;
        for (file, verdict) in &diff.rejected {
            debug!(path = %folder.child(&file.name), ?verdict, "File rejected by crawl rules");
        }
        out.rejected += diff.rejected.len() as u64;
        for name in &diff.unreadable {
            debug!(path = %folder.child(name), "Entry unreadable, keeping last known state");
        }
        out.unchanged += diff.unreadable.len() as u64;
        for leaf in &diff.delete {
            let path = folder.child(&leaf.name);
            out.events.push(ChangeEvent::delete(&path, &self.settings.source_tag));
            out.batch.deletes.insert(path);
        }

        if known.is_none() {
            out.batch.branches.insert(folder.clone());
        }

        let mut live_dirs: Vec<&str> = Vec::new();
        for dir in entries.iter().filter(|e| e.is_dir) {
            self.checkpoint()?;
            let child = folder.child(&dir.name);
            if !self.rules.accepts_folder(&child) {
                debug!(path = %child, "Folder excluded by crawl rules");
                continue;
            }
            live_dirs.push(dir.name.as_str());

            let child_known = match &known {
                Some(k) if k.has_branch(&dir.name) => self.store.lookup_branch(&child),
                _ => None,
            };

            if depth + 1 < INLINE_DEPTH {
                self.walk(&child, child_known, depth + 1, level, out)?;
            } else {
                if child_known.is_none() {
                    out.batch.branches.insert(child.clone());
                }
                out.follow_ups.push(CrawlTask::new(child, child_level(level, depth + 1)));
            }
        }

        if let Some(k) = &known {
            let kept = |n: &String| live_dirs.contains(&n.as_str()) || diff.unreadable.contains(n);
            for name in k.branches.iter().filter(|n| !kept(n)) {
                self.checkpoint()?;
                let child = folder.child(name);
                // excluded folders stay as they were
                if !self.rules.accepts_folder(&child) && entries.iter().any(|e| e.is_dir && e.name == *name) {
                    continue;
                }
                self.delete_subtree(&child, out);
            }
        }
        Ok(())
    }

    fn emit_upsert(&self, action: Action, folder: &CrawlPath, file: &EntryMeta, out: &mut TaskOutcome) {
        let path = folder.child(&file.name);
        let mut acl = self.settings.acl_tokens.clone();
        acl.extend(file.acl_tokens.iter().cloned());
        out.events.push(ChangeEvent::upsert(
            action,
            &path,
            file.last_modified,
            file.size,
            &self.settings.source_tag,
            acl,
        ));
        out.batch.leaves.push(LeafEntry {
            parent: folder.clone(),
            name: file.name.clone(),
            last_modified: file.last_modified,
            size: file.size,
        });
    }

    /// Emit deletes for every known file below `path` and drop the branch.
    fn delete_subtree(&self, path: &CrawlPath, out: &mut TaskOutcome) {
        if let Some(subtree) = self.store.subtree(path) {
            for leaf in &subtree.leaves {
                out.events.push(ChangeEvent::delete(leaf, &self.settings.source_tag));
            }
        }
        out.batch.deletes.insert(path.clone());
    }
}

fn child_level(level: u32, offset: u32) -> u32 {
    if level >= UNKNOWN_DEPTH {
        UNKNOWN_DEPTH
    } else {
        level + offset
    }
}
