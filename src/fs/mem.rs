//! In-memory file system for engine tests.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::{EntryMeta, FileHandle};
use crate::path::CrawlPath;

#[derive(Debug, Clone)]
struct MemEntry {
    is_dir: bool,
    last_modified: i64,
    content: Vec<u8>,
}

#[derive(Default)]
struct Hooks {
    denied: HashSet<CrawlPath>,
    unreadable: HashSet<CrawlPath>,
    cancel_after: Option<(usize, CancellationToken)>,
    lists: usize,
}

#[derive(Default)]
pub struct MemFs {
    entries: Mutex<BTreeMap<CrawlPath, MemEntry>>,
    hooks: Mutex<Hooks>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, raw: &str) -> CrawlPath {
        let path = CrawlPath::parse(raw).unwrap();
        let mut entries = self.entries.lock().unwrap();
        let mut cursor = Some(path.clone());
        while let Some(p) = cursor {
            entries.entry(p.clone()).or_insert(MemEntry { is_dir: true, last_modified: 0, content: Vec::new() });
            cursor = p.parent();
        }
        path
    }

    pub fn add_file(&self, raw: &str, last_modified: i64, size: usize) -> CrawlPath {
        let path = CrawlPath::parse(raw).unwrap();
        if let Some(parent) = path.parent() {
            self.add_dir(&parent.folder_id());
        }
        self.entries.lock().unwrap().insert(
            path.clone(),
            MemEntry { is_dir: false, last_modified, content: vec![b'x'; size] },
        );
        path
    }

    pub fn touch(&self, raw: &str, last_modified: i64) {
        let path = CrawlPath::parse(raw).unwrap();
        if let Some(e) = self.entries.lock().unwrap().get_mut(&path) {
            e.last_modified = last_modified;
        }
    }

    /// Remove `raw` and everything below it.
    pub fn remove(&self, raw: &str) {
        let path = CrawlPath::parse(raw).unwrap();
        self.entries
            .lock()
            .unwrap()
            .retain(|p, _| *p != path && !path.is_ancestor_of(p));
    }

    pub fn deny(&self, raw: &str) {
        self.hooks.lock().unwrap().denied.insert(CrawlPath::parse(raw).unwrap());
    }

    /// Make `raw` fail to stat, both directly and inside its folder's listing.
    pub fn fail_stat(&self, raw: &str) {
        self.hooks.lock().unwrap().unreadable.insert(CrawlPath::parse(raw).unwrap());
    }

    /// Cancel `token` once `lists` folder listings have been served.
    pub fn cancel_after_lists(&self, lists: usize, token: CancellationToken) {
        let mut hooks = self.hooks.lock().unwrap();
        hooks.lists = 0;
        hooks.cancel_after = Some((lists, token));
    }

    pub fn clear_hooks(&self) {
        *self.hooks.lock().unwrap() = Hooks::default();
    }

    fn check_denied(&self, path: &CrawlPath) -> io::Result<()> {
        if self.hooks.lock().unwrap().denied.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        Ok(())
    }

    fn meta(path: &CrawlPath, e: &MemEntry) -> EntryMeta {
        EntryMeta {
            name: path.name().to_string(),
            is_dir: e.is_dir,
            last_modified: e.last_modified,
            size: e.content.len() as u64,
            acl_tokens: vec!["group:staff".to_string()],
            unreadable: false,
        }
    }
}

impl FileHandle for MemFs {
    fn stat(&self, path: &CrawlPath) -> io::Result<Option<EntryMeta>> {
        if self.hooks.lock().unwrap().unreadable.contains(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "stat failed"));
        }
        Ok(self.entries.lock().unwrap().get(path).map(|e| Self::meta(path, e)))
    }

    fn list(&self, path: &CrawlPath) -> io::Result<Vec<EntryMeta>> {
        self.check_denied(path)?;
        let unreadable = {
            let mut hooks = self.hooks.lock().unwrap();
            hooks.lists += 1;
            if let Some((limit, token)) = &hooks.cancel_after {
                if hooks.lists > *limit {
                    token.cancel();
                }
            }
            hooks.unreadable.clone()
        };
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(e) if e.is_dir => {}
            Some(_) => return Err(io::Error::new(io::ErrorKind::Other, "not a directory")),
            None => return Err(io::Error::new(io::ErrorKind::NotFound, "no such folder")),
        }
        Ok(entries
            .iter()
            .filter(|(p, _)| p.parent().as_ref() == Some(path))
            .map(|(p, e)| {
                if unreadable.contains(p) {
                    EntryMeta::unreadable(p.name().to_string())
                } else {
                    Self::meta(p, e)
                }
            })
            .collect())
    }

    fn read(&self, path: &CrawlPath) -> io::Result<Box<dyn Read + Send>> {
        self.check_denied(path)?;
        match self.entries.lock().unwrap().get(path) {
            Some(e) if !e.is_dir => Ok(Box::new(Cursor::new(e.content.clone()))),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }
}
