//! In-memory Branch/Leaf tree. Parents own their children; there are no
//! back-pointers, every upward move re-resolves from the root.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::path::{CrawlPath, Scheme};

/// A folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub full_path: String,
    pub branches: BTreeMap<String, Branch>,
    pub leaves: BTreeMap<String, Leaf>,
}

/// A file as last seen by the crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub name: String,
    /// Epoch milliseconds.
    pub last_modified: i64,
    pub size: u64,
}

/// A file to record under `parent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafEntry {
    pub parent: CrawlPath,
    pub name: String,
    pub last_modified: i64,
    pub size: u64,
}

impl LeafEntry {
    pub fn path(&self) -> CrawlPath {
        self.parent.child(&self.name)
    }
}

/// All tree mutations produced by one crawl task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeBatch {
    pub deletes: BTreeSet<CrawlPath>,
    pub branches: BTreeSet<CrawlPath>,
    pub leaves: Vec<LeafEntry>,
}

impl TreeBatch {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.branches.is_empty() && self.leaves.is_empty()
    }
}

/// Owned view of a folder's immediate children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchView {
    pub full_path: String,
    pub branches: Vec<String>,
    pub leaves: Vec<Leaf>,
}

impl BranchView {
    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.iter().find(|l| l.name == name)
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Branch(BranchView),
    Leaf(Leaf),
}

/// Every node below (and including) a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subtree {
    pub branches: Vec<CrawlPath>,
    pub leaves: Vec<CrawlPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Forest {
    pub roots: BTreeMap<Scheme, Branch>,
}

impl Forest {
    pub fn branch(&self, path: &CrawlPath) -> Option<&Branch> {
        let mut node = self.roots.get(&path.scheme())?;
        for seg in path.segments() {
            node = node.branches.get(seg)?;
        }
        Some(node)
    }

    fn branch_mut(&mut self, path: &CrawlPath) -> Option<&mut Branch> {
        let mut node = self.roots.get_mut(&path.scheme())?;
        for seg in path.segments() {
            node = node.branches.get_mut(seg)?;
        }
        Some(node)
    }

    /// Resolve `path`, creating any missing branch on the way down.
    fn branch_or_create(&mut self, path: &CrawlPath) -> &mut Branch {
        let mut cursor = CrawlPath::root(path.scheme());
        let mut node = self.roots.entry(path.scheme()).or_insert_with(|| Branch {
            name: String::new(),
            full_path: cursor.folder_id(),
            ..Branch::default()
        });
        for seg in path.segments() {
            cursor = cursor.child(seg);
            // a folder replaces a file of the same name
            node.leaves.remove(seg);
            node = node.branches.entry(seg.clone()).or_insert_with(|| Branch {
                name: seg.clone(),
                full_path: cursor.folder_id(),
                ..Branch::default()
            });
        }
        node
    }

    pub fn insert_branch(&mut self, path: &CrawlPath) {
        self.branch_or_create(path);
    }

    pub fn insert_leaf(&mut self, entry: &LeafEntry) {
        let parent = self.branch_or_create(&entry.parent);
        parent.branches.remove(&entry.name);
        parent.leaves.insert(
            entry.name.clone(),
            Leaf {
                name: entry.name.clone(),
                last_modified: entry.last_modified,
                size: entry.size,
            },
        );
    }

    /// Remove the file or folder at `path`. Returns whether anything was removed.
    pub fn delete(&mut self, path: &CrawlPath) -> bool {
        let Some(parent_path) = structural_parent(path) else {
            return self.roots.remove(&path.scheme()).is_some();
        };
        let Some(parent) = self.branch_mut(&parent_path) else {
            return false;
        };
        let name = path.name();
        let branch = parent.branches.remove(name).is_some();
        let leaf = parent.leaves.remove(name).is_some();
        branch || leaf
    }

    pub fn apply(&mut self, batch: &TreeBatch) -> bool {
        let mut changed = false;
        for path in &batch.deletes {
            changed |= self.delete(path);
        }
        for path in &batch.branches {
            self.insert_branch(path);
            changed = true;
        }
        for entry in &batch.leaves {
            self.insert_leaf(entry);
            changed = true;
        }
        changed
    }

    pub fn lookup(&self, path: &CrawlPath) -> Option<Node> {
        if let Some(branch) = self.branch(path) {
            return Some(Node::Branch(view(branch)));
        }
        let parent = self.branch(&structural_parent(path)?)?;
        parent.leaves.get(path.name()).cloned().map(Node::Leaf)
    }

    pub fn subtree(&self, path: &CrawlPath) -> Option<Subtree> {
        let branch = self.branch(path)?;
        let mut out = Subtree::default();
        collect(branch, path, &mut out);
        Some(out)
    }

    pub fn counts(&self) -> (u64, u64) {
        fn walk(b: &Branch, acc: &mut (u64, u64)) {
            acc.0 += b.branches.len() as u64;
            acc.1 += b.leaves.len() as u64;
            for child in b.branches.values() {
                walk(child, acc);
            }
        }
        let mut acc = (0, 0);
        for root in self.roots.values() {
            walk(root, &mut acc);
        }
        acc
    }
}

pub(crate) fn view(branch: &Branch) -> BranchView {
    BranchView {
        full_path: branch.full_path.clone(),
        branches: branch.branches.keys().cloned().collect(),
        leaves: branch.leaves.values().cloned().collect(),
    }
}

// Unlike `CrawlPath::parent`, climbs past share roots.
fn structural_parent(path: &CrawlPath) -> Option<CrawlPath> {
    let (_, init) = path.segments().split_last()?;
    Some(init.iter().fold(CrawlPath::root(path.scheme()), |p, seg| p.child(seg)))
}

fn collect(branch: &Branch, path: &CrawlPath, out: &mut Subtree) {
    out.branches.push(path.clone());
    for name in branch.leaves.keys() {
        out.leaves.push(path.child(name));
    }
    for (name, child) in &branch.branches {
        collect(child, &path.child(name), out);
    }
}
