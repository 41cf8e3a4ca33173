//! Integration tests for the buffer layer.
//!
//! Cross-component behavior: write-back under eviction pressure,
//! persistence across manager instances and file reopens, and the
//! shutdown flush.

use std::sync::Arc;

use emberdb::{BufMgr, DbFile};
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Data survives repeated evictions through a pool much smaller than
/// the working set.
#[test]
fn test_write_back_under_eviction_pressure() {
    init_logging();
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let mut bm = BufMgr::new(2);

    let mut pages = Vec::new();
    for i in 0u8..5 {
        let (p, page) = bm.alloc_page(&file).unwrap();
        page.as_mut_slice()[0] = i;
        page.as_mut_slice()[1] = i.wrapping_mul(3);
        bm.unpin_page(&file, p, true).unwrap();
        pages.push(p);
    }

    for (i, &p) in pages.iter().enumerate() {
        let page = bm.read_page(&file, p).unwrap();
        assert_eq!(page.as_slice()[0], i as u8);
        assert_eq!(page.as_slice()[1], (i as u8).wrapping_mul(3));
        bm.unpin_page(&file, p, false).unwrap();
    }
}

/// Flush, drop everything, reopen the file from a fresh handle.
#[test]
fn test_flush_survives_manager_and_handle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.db");
    let data = b"persistent!";
    let page_no;

    {
        let file = Arc::new(DbFile::create(&path).unwrap());
        let mut bm = BufMgr::new(4);

        let (p, page) = bm.alloc_page(&file).unwrap();
        page_no = p;
        page.as_mut_slice()[..data.len()].copy_from_slice(data);
        bm.unpin_page(&file, p, true).unwrap();
        bm.flush_file(&file).unwrap();
    }

    {
        let file = Arc::new(DbFile::open(&path).unwrap());
        let mut bm = BufMgr::new(4);
        let page = bm.read_page(&file, page_no).unwrap();
        assert_eq!(&page.as_slice()[..data.len()], data);
        bm.unpin_page(&file, page_no, false).unwrap();
    }
}

/// Dropping the manager writes back whatever is still dirty.
#[test]
fn test_shutdown_flush() {
    init_logging();
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let page_no;

    {
        let mut bm = BufMgr::new(4);
        let (p, page) = bm.alloc_page(&file).unwrap();
        page_no = p;
        page.as_mut_slice()[0] = 0x42;
        bm.unpin_page(&file, p, true).unwrap();
    }

    // Read through the file directly; no cache is left.
    assert_eq!(file.read_page(page_no).unwrap().as_slice()[0], 0x42);
}

/// A disposed page's number is reused by the next allocation, and the
/// cache never serves stale bytes for it.
#[test]
fn test_dispose_then_realloc_same_number() {
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let mut bm = BufMgr::new(4);

    let (p, page) = bm.alloc_page(&file).unwrap();
    page.as_mut_slice()[0] = 0xEE;
    bm.unpin_page(&file, p, true).unwrap();
    bm.dispose_page(&file, p).unwrap();

    let (reused, page) = bm.alloc_page(&file).unwrap();
    assert_eq!(reused, p);
    assert_eq!(page.as_slice()[0], 0, "reused slot must come back zeroed");
    bm.unpin_page(&file, reused, false).unwrap();
}

/// Two files interleaved under pressure keep their bytes apart.
#[test]
fn test_interleaved_files_under_pressure() {
    let dir = tempdir().unwrap();
    let a = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let b = Arc::new(DbFile::create(dir.path().join("b.db")).unwrap());
    let mut bm = BufMgr::new(3);

    let mut expected = Vec::new();
    for i in 0u8..4 {
        let (pa, page) = bm.alloc_page(&a).unwrap();
        page.as_mut_slice()[0] = i;
        bm.unpin_page(&a, pa, true).unwrap();

        let (pb, page) = bm.alloc_page(&b).unwrap();
        page.as_mut_slice()[0] = 0x80 | i;
        bm.unpin_page(&b, pb, true).unwrap();

        expected.push((Arc::clone(&a), pa, i));
        expected.push((Arc::clone(&b), pb, 0x80 | i));
    }

    for (file, p, byte) in &expected {
        let page = bm.read_page(file, *p).unwrap();
        assert_eq!(page.as_slice()[0], *byte);
        bm.unpin_page(file, *p, false).unwrap();
    }
}

/// Counters reflect the workload shape.
#[test]
fn test_stats_reflect_workload() {
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let mut bm = BufMgr::new(2);

    let p = file.allocate_page().unwrap().page_number();
    for _ in 0..5 {
        bm.read_page(&file, p).unwrap();
        bm.unpin_page(&file, p, false).unwrap();
    }

    let stats = bm.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 4);
    assert!(stats.hit_rate() > 0.7);

    // Force evictions past the pool size.
    for _ in 0..3 {
        let (p, _) = bm.alloc_page(&file).unwrap();
        bm.unpin_page(&file, p, false).unwrap();
    }
    assert!(bm.stats().evictions >= 1);
}

/// The descriptor dump stays in sync with the pool contents.
#[test]
fn test_print_self_dump() {
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let mut bm = BufMgr::new(2);

    let (p, _) = bm.alloc_page(&file).unwrap();
    bm.unpin_page(&file, p, false).unwrap();

    let dump = format!("{}", bm);
    assert!(dump.contains("total valid frames: 1"));
    assert!(dump.contains(&file.filename()));
    bm.print_self();
}

/// Guards compose with the explicit protocol across eviction cycles.
#[test]
fn test_pinned_guard_roundtrip() {
    let dir = tempdir().unwrap();
    let file = Arc::new(DbFile::create(dir.path().join("a.db")).unwrap());
    let mut bm = BufMgr::new(2);

    let page_no = {
        let mut guard = bm.alloc_page_pinned(&file).unwrap();
        guard.as_mut_slice()[..4].copy_from_slice(b"gust");
        guard.page_number()
    };
    assert_eq!(bm.pin_count(&file, page_no), Some(0));

    // Push the page out through pressure, then read it back.
    for _ in 0..2 {
        let (p, _) = bm.alloc_page(&file).unwrap();
        bm.unpin_page(&file, p, false).unwrap();
    }

    let guard = bm.read_page_pinned(&file, page_no).unwrap();
    assert_eq!(&guard.as_slice()[..4], b"gust");
    drop(guard);

    assert_eq!(bm.pin_count(&file, page_no), Some(0));
}

/// A page number from one file never aliases another file's cache entry,
/// even after the first handle is gone.
#[test]
fn test_identity_outlives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.db");
    let mut bm = BufMgr::new(4);

    let first = Arc::new(DbFile::create(&path).unwrap());
    let (p, page) = bm.alloc_page(&first).unwrap();
    page.as_mut_slice()[0] = 0x11;
    bm.unpin_page(&first, p, true).unwrap();
    bm.flush_file(&first).unwrap();
    drop(first);

    // A reopen is a new identity: nothing is cached for it yet.
    let second = Arc::new(DbFile::open(&path).unwrap());
    assert!(!bm.contains_page(&second, p));
    assert_eq!(bm.read_page(&second, p).unwrap().as_slice()[0], 0x11);
    bm.unpin_page(&second, p, false).unwrap();
}
