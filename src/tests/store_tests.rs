#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::path::CrawlPath;
    use crate::store::{LeafEntry, Node, TreeBatch, TreeStore};

    fn p(raw: &str) -> CrawlPath {
        CrawlPath::parse(raw).unwrap()
    }

    fn leaf(parent: &str, name: &str, mtime: i64) -> LeafEntry {
        LeafEntry { parent: p(parent), name: name.into(), last_modified: mtime, size: 10 }
    }

    #[test]
    fn inserts_create_intermediate_branches() {
        let store = TreeStore::in_memory();
        store.insert_leaves(&[leaf("/a/b/c", "f.txt", 1_000)]);

        let view = store.lookup_branch(&p("/a/b")).unwrap();
        assert_eq!(view.full_path, "file:///a/b/");
        assert_eq!(view.branches, vec!["c".to_string()]);
        match store.lookup(&p("/a/b/c/f.txt")) {
            Some(Node::Leaf(l)) => assert_eq!(l.last_modified, 1_000),
            other => panic!("expected leaf, got {:?}", other),
        }
        assert!(store.lookup(&p("/a/x")).is_none());
        assert!(store.is_dirty());
    }

    #[test]
    fn share_and_local_paths_do_not_collide() {
        let store = TreeStore::in_memory();
        let mut set = BTreeSet::new();
        set.insert(p("smb://fs01/docs"));
        set.insert(p("/fs01/docs"));
        store.insert_branches(&set);

        assert_eq!(store.lookup_branch(&p("smb://fs01/docs")).unwrap().full_path, "smb://fs01/docs/");
        assert_eq!(store.lookup_branch(&p("/fs01/docs")).unwrap().full_path, "file:///fs01/docs/");
    }

    #[test]
    fn deleting_a_branch_removes_its_subtree() {
        let store = TreeStore::in_memory();
        store.insert_leaves(&[leaf("/r/b", "f1", 1), leaf("/r/b/b1", "f2", 1)]);

        let subtree = store.subtree(&p("/r/b")).unwrap();
        assert_eq!(subtree.leaves.len(), 2);
        assert_eq!(subtree.branches.len(), 2);

        store.delete_nodes(&[p("/r/b")].into_iter().collect());
        assert!(store.lookup(&p("/r/b")).is_none());
        assert!(store.lookup(&p("/r/b/b1/f2")).is_none());
        assert!(store.lookup_branch(&p("/r")).is_some());
    }

    #[test]
    fn deleting_a_share_folder_keeps_the_share() {
        let store = TreeStore::in_memory();
        store.insert_leaves(&[leaf("smb://fs01/docs/a", "x.pdf", 1), leaf("smb://fs01/docs", "y.pdf", 1)]);
        store.delete_nodes(&[p("smb://fs01/docs/a")].into_iter().collect());

        let share = store.lookup_branch(&p("smb://fs01/docs")).unwrap();
        assert!(share.branches.is_empty());
        assert_eq!(share.leaves.len(), 1);
    }

    #[test]
    fn batch_applies_deletes_before_inserts() {
        let store = TreeStore::in_memory();
        store.insert_branches(&[p("/r/x")].into_iter().collect());

        // folder x became a file x
        let mut batch = TreeBatch::default();
        batch.deletes.insert(p("/r/x"));
        batch.leaves.push(leaf("/r", "x", 5_000));
        store.apply(&batch);

        assert!(matches!(store.lookup(&p("/r/x")), Some(Node::Leaf(_))));
        assert_eq!(store.stats().leaves, 1);
    }

    #[test]
    fn leaf_insert_replaces_previous_state() {
        let store = TreeStore::in_memory();
        store.insert_leaves(&[leaf("/r", "a", 1_000)]);
        store.insert_leaves(&[leaf("/r", "a", 9_000)]);
        let view = store.lookup_branch(&p("/r")).unwrap();
        assert_eq!(view.leaves.len(), 1);
        assert_eq!(view.leaf("a").unwrap().last_modified, 9_000);
    }

    #[tokio::test]
    async fn flush_only_when_dirty_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("state").join("crate.msgpack");

        let store = TreeStore::open(&file).await.unwrap();
        assert!(!store.flush_if_dirty().await.unwrap());
        assert!(!file.exists());

        store.insert_leaves(&[leaf("/r/a", "f.txt", 42_000), leaf("smb://fs01/docs", "g.txt", 7_000)]);
        assert!(store.flush_if_dirty().await.unwrap());
        assert!(!store.is_dirty());
        assert!(!store.flush_if_dirty().await.unwrap());

        let reloaded = TreeStore::open(&file).await.unwrap();
        assert_eq!(reloaded.lookup(&p("/r/a/f.txt")), store.lookup(&p("/r/a/f.txt")));
        assert!(reloaded.lookup(&p("smb://fs01/docs/g.txt")).is_some());
        assert_eq!(reloaded.stats().leaves, 2);
    }

    #[tokio::test]
    async fn missing_file_starts_empty_and_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = TreeStore::open(dir.path().join("none.msgpack")).await.unwrap();
        assert_eq!(store.stats().leaves, 0);

        let bad = dir.path().join("bad.msgpack");
        std::fs::write(&bad, b"not a tree").unwrap();
        assert!(TreeStore::open(&bad).await.is_err());
    }

    #[tokio::test]
    async fn discard_removes_the_durable_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("crate.msgpack");
        let store = TreeStore::open(&file).await.unwrap();
        store.insert_leaves(&[leaf("/r", "a", 1)]);
        store.flush_if_dirty().await.unwrap();
        assert!(file.exists());

        store.discard().await.unwrap();
        assert!(!file.exists());
        assert!(store.lookup_branch(&p("/r")).is_none());
    }
}
