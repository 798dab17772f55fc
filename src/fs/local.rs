use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

use super::{EntryMeta, FileHandle};
use crate::path::CrawlPath;

/// Direct access to the local file system.
#[derive(Debug, Default, Clone)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn native(path: &CrawlPath) -> io::Result<std::path::PathBuf> {
    path.to_local_path()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, format!("{} is not a local path", path)))
}

impl FileHandle for LocalFs {
    fn stat(&self, path: &CrawlPath) -> io::Result<Option<EntryMeta>> {
        stat_native(&native(path)?, path.name())
    }

    fn list(&self, path: &CrawlPath) -> io::Result<Vec<EntryMeta>> {
        list_native(&native(path)?)
    }

    fn read(&self, path: &CrawlPath) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(native(path)?)?))
    }
}

pub(super) fn stat_native(path: &Path, name: &str) -> io::Result<Option<EntryMeta>> {
    match fs::metadata(path) {
        Ok(md) => Ok(Some(entry_meta(name.to_string(), &md))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub(super) fn list_native(dir: &Path) -> io::Result<Vec<EntryMeta>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        // a nameless failure makes the whole listing untrustworthy
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let ft = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), "Failed to read entry type: {}", e);
                out.push(EntryMeta::unreadable(name));
                continue;
            }
        };
        if ft.is_symlink() {
            continue;
        }
        match entry.metadata() {
            Ok(md) => out.push(entry_meta(name, &md)),
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), "Failed to stat entry: {}", e);
                out.push(EntryMeta::unreadable(name));
            }
        }
    }
    Ok(out)
}

fn entry_meta(name: String, md: &fs::Metadata) -> EntryMeta {
    let last_modified = md
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    EntryMeta {
        name,
        is_dir: md.is_dir(),
        last_modified,
        size: if md.is_dir() { 0 } else { md.len() },
        acl_tokens: acl_tokens(md),
        unreadable: false,
    }
}

#[cfg(unix)]
fn acl_tokens(md: &fs::Metadata) -> Vec<String> {
    use std::os::unix::fs::MetadataExt;
    vec![format!("uid:{}", md.uid()), format!("gid:{}", md.gid())]
}

#[cfg(not(unix))]
fn acl_tokens(_md: &fs::Metadata) -> Vec<String> {
    Vec::new()
}
