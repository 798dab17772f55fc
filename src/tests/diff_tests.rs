#[cfg(test)]
mod tests {
    use crate::crawler::diff::{classify, is_newer};
    use crate::fs::EntryMeta;
    use crate::path::CrawlPath;
    use crate::rules::{CrawlRules, Verdict};
    use crate::config::RulesConfig;
    use crate::store::Leaf;

    fn file(name: &str, mtime: i64) -> EntryMeta {
        EntryMeta { name: name.into(), is_dir: false, last_modified: mtime, size: 100, acl_tokens: vec![], unreadable: false }
    }

    fn known(name: &str, mtime: i64) -> Leaf {
        Leaf { name: name.into(), last_modified: mtime, size: 100 }
    }

    fn folder() -> CrawlPath {
        CrawlPath::parse("/data").unwrap()
    }

    fn names(v: &[EntryMeta]) -> Vec<&str> {
        v.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn classifies_into_disjoint_lists() {
        let rules = CrawlRules::permissive(u64::MAX);
        let live = vec![file("x", 1_000_000), file("y", 5_000), file("w", 2_000_000)];
        let known_leaves = vec![known("x", 1_000_000), known("z", 1), known("w", 1_000_000)];

        let diff = classify(&folder(), &live, &known_leaves, &rules);
        assert_eq!(names(&diff.insert), vec!["y"]);
        assert_eq!(names(&diff.update), vec!["w"]);
        assert_eq!(names(&diff.unchanged), vec!["x"]);
        assert_eq!(diff.delete, vec![known("z", 1)]);
    }

    #[test]
    fn one_second_newer_is_an_update() {
        let rules = CrawlRules::permissive(u64::MAX);
        let diff = classify(&folder(), &[file("x", 1_001_000)], &[known("x", 1_000_000)], &rules);
        assert_eq!(names(&diff.update), vec!["x"]);
    }

    #[test]
    fn sub_second_and_older_changes_are_unchanged() {
        let rules = CrawlRules::permissive(u64::MAX);
        let diff = classify(&folder(), &[file("x", 1_000_900)], &[known("x", 1_000_000)], &rules);
        assert!(diff.is_quiet());
        let diff = classify(&folder(), &[file("x", 900_000)], &[known("x", 1_000_000)], &rules);
        assert_eq!(names(&diff.unchanged), vec!["x"]);

        assert!(is_newer(2_000, 1_999));
        assert!(!is_newer(1_999, 1_000));
    }

    #[test]
    fn classification_is_idempotent() {
        let rules = CrawlRules::permissive(u64::MAX);
        let live = vec![file("a", 3_000), file("b", 4_000)];
        let known_leaves = vec![known("a", 3_000), known("b", 4_000)];
        for _ in 0..2 {
            let diff = classify(&folder(), &live, &known_leaves, &rules);
            assert!(diff.is_quiet());
            assert_eq!(diff.unchanged.len(), 2);
        }
    }

    #[test]
    fn folders_in_the_listing_are_ignored() {
        let rules = CrawlRules::permissive(u64::MAX);
        let mut sub = file("sub", 1);
        sub.is_dir = true;
        let diff = classify(&folder(), &[sub], &[], &rules);
        assert!(diff.insert.is_empty() && diff.rejected.is_empty());
    }

    #[test]
    fn rejected_files_never_insert_and_known_ones_are_retracted() {
        let rules = CrawlRules::from_config(&RulesConfig {
            include_types: vec![],
            exclude_types: vec!["tmp".into()],
            exclude_files: vec![],
            exclude_globs: vec![],
            max_file_size: 1_000,
        })
        .unwrap();
        let live = vec![file("a.tmp", 9_000_000), file("b.txt", 1)];
        let diff = classify(&folder(), &live, &[known("a.tmp", 1)], &rules);

        assert_eq!(names(&diff.insert), vec!["b.txt"]);
        assert!(diff.update.is_empty());
        assert_eq!(diff.rejected.len(), 1);
        assert_eq!(diff.rejected[0].1, Verdict::ExcludedType);
        assert_eq!(diff.delete, vec![known("a.tmp", 1)]);
    }

    #[test]
    fn unreadable_entries_are_neither_deleted_nor_inserted() {
        let rules = CrawlRules::permissive(u64::MAX);
        let live = vec![EntryMeta::unreadable("x".into()), EntryMeta::unreadable("new".into()), file("y", 1_000_000)];
        let diff = classify(&folder(), &live, &[known("x", 1_000_000), known("y", 1_000_000)], &rules);

        assert!(diff.is_quiet());
        assert_eq!(names(&diff.unchanged), vec!["y"]);
        assert_eq!(diff.unreadable, vec!["x".to_string(), "new".to_string()]);
        assert!(diff.rejected.is_empty());
    }
}
