//! Canonical crawl locations.
//!
//! Every folder and file the crawler touches is addressed by a URI-style id:
//! `file:///srv/docs/` or `file://C:/docs/` for local paths and
//! `smb://server/share/docs/` for network shares. Folder ids carry a trailing
//! slash, file ids do not.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    File,
    Smb,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::File => "file",
            Scheme::Smb => "smb",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Scheme::File => "file://",
            Scheme::Smb => "smb://",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrawlPath {
    scheme: Scheme,
    segments: Vec<String>,
}

impl CrawlPath {
    /// Parse any of the accepted spellings of a folder or file location.
    ///
    /// Accepts `smb://server/share/p`, `smb:\\server\share\p`, UNC
    /// `\\server\share\p`, `file://...`, absolute POSIX paths, Windows drive
    /// paths (`C:\p`, `C:/p`) and relative paths (resolved against the
    /// current directory).
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CrawlError::invalid_path(raw, "empty path"));
        }
        if trimmed.contains('\0') {
            return Err(CrawlError::invalid_path(raw, "path contains null characters"));
        }
        let normalized = trimmed.replace('\\', "/");

        if let Some(rest) = strip_prefix_ci(&normalized, "smb:") {
            let rest = rest.trim_start_matches('/');
            let segments = split_segments(rest);
            if segments.len() < 2 {
                return Err(CrawlError::invalid_path(raw, "share paths need a server and a share"));
            }
            return Ok(Self { scheme: Scheme::Smb, segments });
        }

        if normalized.starts_with("//") {
            let segments = split_segments(&normalized);
            if segments.len() < 2 {
                return Err(CrawlError::invalid_path(raw, "UNC paths need a server and a share"));
            }
            return Ok(Self { scheme: Scheme::Smb, segments });
        }

        let local = match strip_prefix_ci(&normalized, "file://") {
            Some(rest) => rest.to_string(),
            None => normalized,
        };

        if is_drive_path(&local) {
            let mut segments = split_segments(&local);
            if let Some(drive) = segments.first_mut() {
                *drive = drive.to_ascii_uppercase();
            }
            return Ok(Self { scheme: Scheme::File, segments });
        }

        if local.starts_with('/') {
            return Ok(Self { scheme: Scheme::File, segments: split_segments(&local) });
        }

        let absolute = std::path::absolute(Path::new(&local))
            .map_err(|e| CrawlError::invalid_path(raw, e.to_string()))?;
        let absolute = absolute.to_string_lossy().replace('\\', "/");
        Self::parse(&absolute)
    }

    /// Top of a scheme's namespace (`file:///` or the share namespace).
    pub fn root(scheme: Scheme) -> Self {
        Self { scheme, segments: Vec::new() }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last path segment, empty for the file system root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { scheme: self.scheme, segments }
    }

    pub fn parent(&self) -> Option<Self> {
        let min = match self.scheme {
            Scheme::File => 0,
            Scheme::Smb => 2,
        };
        if self.segments.len() <= min {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { scheme: self.scheme, segments })
    }

    /// `smb://server/share` for share paths, `None` for local ones.
    pub fn share_root(&self) -> Option<Self> {
        match self.scheme {
            Scheme::Smb if self.segments.len() >= 2 => {
                Some(Self { scheme: self.scheme, segments: self.segments[..2].to_vec() })
            }
            _ => None,
        }
    }

    /// True when `other` lies strictly below `self`.
    pub fn is_ancestor_of(&self, other: &CrawlPath) -> bool {
        self.scheme == other.scheme
            && other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Canonical id of this location as a folder (trailing slash).
    pub fn folder_id(&self) -> String {
        let mut id = self.file_id();
        if !id.ends_with('/') {
            id.push('/');
        }
        id
    }

    /// Canonical id of this location as a file (no trailing slash).
    pub fn file_id(&self) -> String {
        let joined = self.segments.join("/");
        match self.scheme {
            Scheme::Smb => format!("{}{}", self.scheme.prefix(), joined),
            Scheme::File if self.is_drive() => format!("{}{}", self.scheme.prefix(), drive_join(&self.segments)),
            Scheme::File => format!("{}/{}", self.scheme.prefix(), joined),
        }
    }

    /// Native location of a local path. Share paths are mapped by the share
    /// file handle instead.
    pub fn to_local_path(&self) -> Option<PathBuf> {
        match self.scheme {
            Scheme::Smb => None,
            Scheme::File if self.is_drive() => Some(PathBuf::from(drive_join(&self.segments))),
            Scheme::File => Some(PathBuf::from(format!("/{}", self.segments.join("/")))),
        }
    }

    fn is_drive(&self) -> bool {
        self.segments.first().map(|s| is_drive_segment(s)).unwrap_or(false)
    }
}

impl fmt::Display for CrawlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_id())
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn split_segments(s: &str) -> Vec<String> {
    s.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .map(str::to_string)
        .collect()
}

fn is_drive_segment(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_drive_path(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && (bytes.len() == 2 || bytes[2] == b'/')
}

fn drive_join(segments: &[String]) -> String {
    match segments.split_first() {
        Some((drive, rest)) => format!("{}/{}", drive, rest.join("/")),
        None => String::new(),
    }
}
