#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::Arc;

    use crate::fs::mem::MemFs;
    use crate::fs::{FileHandle, FileSystems, LocalFs};
    use crate::path::CrawlPath;

    fn p(raw: &std::path::Path) -> CrawlPath {
        CrawlPath::parse(raw.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_local_listing_and_stat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let fs = LocalFs::new();
        let mut entries = fs.list(&p(dir.path())).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].size, 5);
        assert!(!entries[0].is_dir);
        assert!(entries[0].last_modified > 0);
        assert!(entries[1].is_dir);
        assert_eq!(entries[1].size, 0);

        let file = p(&dir.path().join("a.txt"));
        assert_eq!(fs.stat(&file).unwrap().unwrap().name, "a.txt");
        assert!(fs.exists(&file).unwrap());
        assert!(!fs.is_dir(&file).unwrap());
        assert!(fs.is_dir(&p(&dir.path().join("sub"))).unwrap());
        assert!(fs.stat(&p(&dir.path().join("missing"))).unwrap().is_none());

        let mut content = String::new();
        fs.read(&file).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_local_listing_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt")).unwrap();

        let entries = LocalFs::new().list(&p(dir.path())).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.txt");
        assert!(entries[0].acl_tokens.iter().any(|t| t.starts_with("uid:")));
    }

    #[test]
    fn test_local_handle_rejects_share_paths() {
        let share = CrawlPath::parse("smb://fs01/docs").unwrap();
        assert!(LocalFs::new().list(&share).is_err());
    }

    #[test]
    fn test_routing_by_scheme() {
        let local = Arc::new(MemFs::new());
        local.add_file("/srv/a.txt", 1_000, 3);
        let share = Arc::new(MemFs::new());
        share.add_file("smb://fs01/docs/b.txt", 2_000, 4);
        let fs = FileSystems::new(local, share);

        assert!(fs.exists(&CrawlPath::parse("/srv/a.txt").unwrap()).unwrap());
        assert!(!fs.exists(&CrawlPath::parse("smb://fs01/docs/a.txt").unwrap()).unwrap());
        let listed = fs.list(&CrawlPath::parse("smb://fs01/docs").unwrap()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 4);

        let single = FileSystems::single(Arc::new(MemFs::new()));
        assert!(!single.exists(&CrawlPath::parse("/srv").unwrap()).unwrap());
    }
}
