//! File access behind one capability interface, so the crawl engine does not
//! care whether a folder lives on a local disk or on a network share.

mod local;
#[cfg(test)]
pub mod mem;
mod share;

pub use local::LocalFs;
pub use share::ShareFs;

use std::io::{self, Read};
use std::sync::Arc;

use crate::path::{CrawlPath, Scheme};

/// Metadata of one folder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub is_dir: bool,
    /// Epoch milliseconds.
    pub last_modified: i64,
    pub size: u64,
    pub acl_tokens: Vec<String>,
    /// Listed, but its metadata could not be read. The crawler keeps the
    /// last known state for such names.
    pub unreadable: bool,
}

impl EntryMeta {
    pub fn unreadable(name: String) -> Self {
        Self { name, is_dir: false, last_modified: 0, size: 0, acl_tokens: Vec::new(), unreadable: true }
    }
}

/// Blocking file access. Network I/O stalls the calling thread for the
/// duration of the call, so callers run it off the async executor.
pub trait FileHandle: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`.
    fn stat(&self, path: &CrawlPath) -> io::Result<Option<EntryMeta>>;

    /// Immediate children of a folder. Symbolic links are not reported.
    fn list(&self, path: &CrawlPath) -> io::Result<Vec<EntryMeta>>;

    fn read(&self, path: &CrawlPath) -> io::Result<Box<dyn Read + Send>>;

    fn exists(&self, path: &CrawlPath) -> io::Result<bool> {
        Ok(self.stat(path)?.is_some())
    }

    fn is_dir(&self, path: &CrawlPath) -> io::Result<bool> {
        Ok(self.stat(path)?.map(|m| m.is_dir).unwrap_or(false))
    }
}

/// Routes each path to the handle for its scheme.
#[derive(Clone)]
pub struct FileSystems {
    local: Arc<dyn FileHandle>,
    share: Arc<dyn FileHandle>,
}

impl FileSystems {
    pub fn new(local: Arc<dyn FileHandle>, share: Arc<dyn FileHandle>) -> Self {
        Self { local, share }
    }

    /// One handle serving both schemes.
    pub fn single(handle: Arc<dyn FileHandle>) -> Self {
        Self { local: handle.clone(), share: handle }
    }

    fn route(&self, path: &CrawlPath) -> &dyn FileHandle {
        match path.scheme() {
            Scheme::File => self.local.as_ref(),
            Scheme::Smb => self.share.as_ref(),
        }
    }
}

impl FileHandle for FileSystems {
    fn stat(&self, path: &CrawlPath) -> io::Result<Option<EntryMeta>> {
        self.route(path).stat(path)
    }

    fn list(&self, path: &CrawlPath) -> io::Result<Vec<EntryMeta>> {
        self.route(path).list(path)
    }

    fn read(&self, path: &CrawlPath) -> io::Result<Box<dyn Read + Send>> {
        self.route(path).read(path)
    }
}
