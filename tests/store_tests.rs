//! Store Tests
//!
//! Tests verify:
//! - Namespaces are isolated from each other
//! - One handle per namespace, even under concurrent first requests
//! - Closing the store closes every handle

use std::fs;
use std::ops::ControlFlow;
use std::sync::{Arc, Barrier};
use std::thread;

use kvmux::{Config, Error, KeyValue, PutOptions, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, Store) {
    let temp = TempDir::new().unwrap();
    let store = Store::open_with(
        Config::builder()
            .data_dir(temp.path())
            .auto_merge_interval(None)
            .build(),
    )
    .unwrap();
    (temp, store)
}

fn put(kv: &dyn KeyValue, key: &str, data: &[u8]) {
    kv.put(PutOptions {
        key,
        data,
        replace: false,
    })
    .unwrap();
}

fn listed(kv: &dyn KeyValue) -> Vec<String> {
    kv.keys("").collect::<kvmux::Result<_>>().unwrap()
}

// =============================================================================
// Isolation
// =============================================================================

#[test]
fn test_namespaces_are_isolated() {
    let (_temp, store) = setup_store();
    let a = store.kv("a");
    let b = store.kv("b");

    put(&*a, "k", b"from-a");

    assert!(b.get("k").unwrap_err().is_not_found());
    assert!(b.has(&["k"]).unwrap().is_empty());
    assert!(listed(&*b).is_empty());
    assert_eq!(b.len().unwrap(), 0);

    // Same logical key in both namespaces, independent values
    put(&*b, "k", b"from-b");
    assert_eq!(a.get("k").unwrap(), b"from-a");
    assert_eq!(b.get("k").unwrap(), b"from-b");

    b.delete("k").unwrap();
    assert_eq!(a.get("k").unwrap(), b"from-a");
}

#[test]
fn test_prefix_sharing_names_stay_apart() {
    let (_temp, store) = setup_store();
    let short = store.kv("user");
    let long = store.kv("users");

    put(&*short, "sally", b"1");
    put(&*long, "bob", b"2");
    put(&*long, "alice", b"3");

    assert_eq!(listed(&*short), vec!["sally"]);
    assert_eq!(listed(&*long), vec!["alice", "bob"]);
    assert!(short.get("salice").unwrap_err().is_not_found());
    assert_eq!(short.len().unwrap(), 1);
    assert_eq!(long.len().unwrap(), 2);
}

#[test]
fn test_listing_stops_at_namespace_end() {
    let (_temp, store) = setup_store();
    let first = store.kv("a");
    let second = store.kv("b");
    for key in ["x", "y"] {
        put(&*first, key, b"v");
        put(&*second, key, b"v");
    }

    let mut seen = Vec::new();
    first
        .list("", &mut |key: &str| -> kvmux::Result<ControlFlow<()>> {
            seen.push(key.to_string());
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();

    assert_eq!(seen, vec!["x", "y"]);
}

// =============================================================================
// Handle Identity
// =============================================================================

#[test]
fn test_same_name_same_handle() {
    let (_temp, store) = setup_store();

    let first = store.kv("ns");
    let again = store.kv(b"ns");
    let other = store.kv("other");

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(store.namespaces(), vec![b"ns".to_vec(), b"other".to_vec()]);
}

#[test]
fn test_concurrent_first_requests_share_handle() {
    let (_temp, store) = setup_store();
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let kv = store.kv("shared");
                put(&*kv, &format!("k{}", i), b"v");
                kv
            })
        })
        .collect();

    let kvs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for kv in &kvs[1..] {
        assert!(Arc::ptr_eq(&kvs[0], kv));
    }
    assert_eq!(store.namespaces().len(), 1);
    assert_eq!(kvs[0].len().unwrap(), 8);
}

// =============================================================================
// Close
// =============================================================================

#[test]
fn test_handle_close_is_noop() {
    let (_temp, store) = setup_store();
    let kv = store.kv("ns");
    put(&*kv, "k", b"v");

    kv.close().unwrap();

    assert_eq!(kv.get("k").unwrap(), b"v");
    assert!(!store.engine().is_closed());
}

#[test]
fn test_close_then_operate_fails() {
    let (_temp, store) = setup_store();
    let kv = store.kv("ns");
    put(&*kv, "k", b"v");

    store.close().unwrap();

    assert!(matches!(kv.get("k"), Err(Error::Closed)));
    assert!(kv
        .put(PutOptions {
            key: "k2",
            data: b"v",
            replace: true,
        })
        .unwrap_err()
        .is_closed());
    assert!(kv.delete("k").unwrap_err().is_closed());
    assert!(kv.keys("").next().unwrap().unwrap_err().is_closed());
    assert!(kv.has(&[]).unwrap_err().is_closed());
    assert!(kv.has(&[""]).unwrap_err().is_closed());
    assert!(store.kv("late").len().unwrap_err().is_closed());

    // Already closed
    store.close().unwrap();
}

#[test]
fn test_close_reports_failed_merge() {
    let (_temp, store) = setup_store();
    put(&*store.kv("ns"), "k", b"v");
    store.engine().flush().unwrap();

    let sst = fs::read_dir(store.engine().storage_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().map_or(false, |ext| ext == "sst"))
        .unwrap();
    // Header (14) + record header (8) + key "\x02nsk" (4) puts the value at 26
    let mut bytes = fs::read(&sst).unwrap();
    bytes[26] ^= 0xff;
    fs::write(&sst, &bytes).unwrap();

    assert!(matches!(store.close(), Err(Error::Storage(_))));
    assert!(store.engine().is_closed());

    // Already closed
    store.close().unwrap();
}

#[test]
fn test_reopen_preserves_namespaces() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .auto_merge_interval(None)
        .build();
    {
        let store = Store::open_with(config.clone()).unwrap();
        put(&*store.kv("a"), "one", b"1");
        put(&*store.kv("b"), "two", b"2");
        store.kv("b").delete("two").unwrap();
        put(&*store.kv("b"), "three", b"3");
        store.close().unwrap();
    }

    let store = Store::open_with(config).unwrap();
    assert_eq!(store.kv("a").get("one").unwrap(), b"1");
    assert_eq!(listed(&*store.kv("b")), vec!["three"]);
    assert_eq!(store.engine().stat().unwrap().keys_num, 2);
    // The merge on close left a single table
    assert_eq!(store.engine().sstable_count(), 1);
    store.close().unwrap();
}

// =============================================================================
// Error Joining
// =============================================================================

#[test]
fn test_error_join() {
    assert!(Error::join([None, None]).is_ok());

    let single = Error::join([None, Some(Error::Closed)]).unwrap_err();
    assert!(single.is_closed());

    let both = Error::join([
        Some(Error::Storage("merge failed".to_string())),
        Some(Error::Closed),
    ])
    .unwrap_err();
    assert!(matches!(&both, Error::Multiple(errors) if errors.len() == 2));
    assert_eq!(both.to_string(), "Storage error: merge failed\nstore closed");
}
