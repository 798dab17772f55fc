use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::config::RulesConfig;
use crate::error::CrawlError;
use crate::path::CrawlPath;

/// Why a file or folder was kept out of the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    ExcludedPattern,
    ExcludedType,
    NotIncludedType,
    TooLarge,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Stateless include/exclude predicates shared by every worker.
#[derive(Debug, Clone)]
pub struct CrawlRules {
    include_types: Vec<String>,
    exclude_types: Vec<String>,
    exclude_files: Vec<Regex>,
    exclude_globs: GlobSet,
    max_file_size: u64,
}

impl CrawlRules {
    pub fn from_config(cfg: &RulesConfig) -> Result<Self, CrawlError> {
        let mut exclude_files = Vec::with_capacity(cfg.exclude_files.len());
        for pattern in &cfg.exclude_files {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(CrawlError::Config("empty exclude_files pattern".into()));
            }
            // whole-path match
            let re = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| CrawlError::Config(format!("exclude_files {:?}: {}", pattern, e)))?;
            exclude_files.push(re);
        }

        Ok(Self {
            include_types: normalize_types(&cfg.include_types),
            exclude_types: normalize_types(&cfg.exclude_types),
            exclude_files,
            exclude_globs: build_globset(&cfg.exclude_globs)?,
            max_file_size: cfg.max_file_size,
        })
    }

    /// Rules that accept everything up to `max_file_size`.
    pub fn permissive(max_file_size: u64) -> Self {
        Self {
            include_types: Vec::new(),
            exclude_types: Vec::new(),
            exclude_files: Vec::new(),
            exclude_globs: GlobSet::empty(),
            max_file_size,
        }
    }

    pub fn accepts_folder(&self, path: &CrawlPath) -> bool {
        !self.matches_excludes(&path.file_id())
    }

    pub fn check_file(&self, path: &CrawlPath, size: u64) -> Verdict {
        let id = path.file_id();
        if self.matches_excludes(&id) {
            return Verdict::ExcludedPattern;
        }
        if let Some(ext) = extension(path.name()) {
            if !self.include_types.is_empty() && !self.include_types.iter().any(|t| *t == ext) {
                return Verdict::NotIncludedType;
            }
            if self.exclude_types.iter().any(|t| *t == ext) {
                return Verdict::ExcludedType;
            }
        }
        if size >= self.max_file_size {
            return Verdict::TooLarge;
        }
        Verdict::Accepted
    }

    pub fn accepts_file(&self, path: &CrawlPath, size: u64) -> bool {
        self.check_file(path, size).is_accepted()
    }

    fn matches_excludes(&self, id: &str) -> bool {
        if self.exclude_files.iter().any(|re| re.is_match(id)) {
            return true;
        }
        !self.exclude_globs.is_empty() && self.exclude_globs.is_match(id)
    }
}

fn normalize_types(types: &[String]) -> Vec<String> {
    types
        .iter()
        .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Lowercased extension, `None` for names without one (including dotfiles).
fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, CrawlError> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        if p.trim().is_empty() {
            continue;
        }
        let norm = p.trim().replace('\\', "/");
        let g = Glob::new(&norm).map_err(|e| CrawlError::Config(format!("exclude_globs {:?}: {}", norm, e)))?;
        b.add(g);
    }
    b.build().map_err(|e| CrawlError::Config(e.to_string()))
}
