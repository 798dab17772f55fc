use std::collections::{HashMap, HashSet};

use crate::fs::EntryMeta;
use crate::path::CrawlPath;
use crate::rules::{CrawlRules, Verdict};
use crate::store::Leaf;

/// Classification of one folder's immediate files against the tree store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diff {
    pub insert: Vec<EntryMeta>,
    pub update: Vec<EntryMeta>,
    pub unchanged: Vec<EntryMeta>,
    pub delete: Vec<Leaf>,
    pub rejected: Vec<(EntryMeta, Verdict)>,
    /// Names listed without readable metadata, kept as they are.
    pub unreadable: Vec<String>,
}

impl Diff {
    /// True when nothing has to be emitted for the folder.
    pub fn is_quiet(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Modification times are compared at one-second granularity.
pub fn is_newer(live_ms: i64, known_ms: i64) -> bool {
    live_ms.div_euclid(1000) > known_ms.div_euclid(1000)
}

/// Classify the live files of `folder` against its known leaves.
///
/// Folders in `live` are ignored. A known leaf without an accepted live file
/// of the same name is deleted, which also retracts files that a rule now
/// rejects. Unreadable entries count as present and unchanged.
pub fn classify(folder: &CrawlPath, live: &[EntryMeta], known: &[Leaf], rules: &CrawlRules) -> Diff {
    let mut diff = Diff::default();
    let by_name: HashMap<&str, &Leaf> = known.iter().map(|leaf| (leaf.name.as_str(), leaf)).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(live.len());

    for file in live.iter().filter(|e| e.unreadable) {
        seen.insert(file.name.as_str());
        diff.unreadable.push(file.name.clone());
    }
    for file in live.iter().filter(|e| !e.is_dir && !e.unreadable) {
        let verdict = rules.check_file(&folder.child(&file.name), file.size);
        if !verdict.is_accepted() {
            diff.rejected.push((file.clone(), verdict));
            continue;
        }
        seen.insert(file.name.as_str());
        match by_name.get(file.name.as_str()) {
            None => diff.insert.push(file.clone()),
            Some(leaf) if is_newer(file.last_modified, leaf.last_modified) => diff.update.push(file.clone()),
            Some(_) => diff.unchanged.push(file.clone()),
        }
    }

    diff.delete = known
        .iter()
        .filter(|leaf| !seen.contains(leaf.name.as_str()))
        .cloned()
        .collect();
    diff
}
