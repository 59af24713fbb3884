//! Key-Value Contract Tests
//!
//! Tests verify, for both store handles and single-namespace stores:
//! - Get/put/delete semantics and the errors they report
//! - Empty keys are rejected
//! - Listing order, start bounds, early stop and error propagation
//! - Key counting

use std::ops::ControlFlow;
use std::sync::Arc;

use kvmux::{Config, Error, KeyValue, Kv, PutOptions, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .auto_merge_interval(None)
        .build()
}

fn setup_kv() -> (TempDir, Store, Arc<Kv>) {
    let temp = TempDir::new().unwrap();
    let store = Store::open_with(config(&temp)).unwrap();
    let kv = store.kv("test");
    (temp, store, kv)
}

fn put(kv: &dyn KeyValue, key: &str, data: &[u8]) -> kvmux::Result<()> {
    kv.put(PutOptions {
        key,
        data,
        replace: false,
    })
}

fn listed(kv: &dyn KeyValue, start: &str) -> Vec<String> {
    let mut keys = Vec::new();
    kv.list(start, &mut |key: &str| -> kvmux::Result<ControlFlow<()>> {
        keys.push(key.to_string());
        Ok(ControlFlow::Continue(()))
    })
    .unwrap();
    keys
}

// =============================================================================
// Point Operations
// =============================================================================

#[test]
fn test_put_then_get() {
    let (_temp, _store, kv) = setup_kv();

    put(&*kv, "k", b"v").unwrap();

    assert_eq!(kv.get("k").unwrap(), b"v");
}

#[test]
fn test_get_missing_reports_key() {
    let (_temp, _store, kv) = setup_kv();

    let err = kv.get("absent").unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(&err, Error::KeyNotFound(k) if k == "absent"));
    assert_eq!(err.to_string(), "key \"absent\" not found");
}

#[test]
fn test_put_without_replace_conflicts() {
    let (_temp, _store, kv) = setup_kv();
    put(&*kv, "k", b"v1").unwrap();

    let err = put(&*kv, "k", b"v2").unwrap_err();

    assert!(err.is_key_exists());
    assert!(matches!(&err, Error::KeyExists(k) if k == "k"));
    assert_eq!(kv.get("k").unwrap(), b"v1");
}

#[test]
fn test_put_with_replace_overwrites() {
    let (_temp, _store, kv) = setup_kv();
    put(&*kv, "k", b"v1").unwrap();

    kv.put(PutOptions {
        key: "k",
        data: b"v2",
        replace: true,
    })
    .unwrap();

    assert_eq!(kv.get("k").unwrap(), b"v2");
}

#[test]
fn test_empty_value_round_trips() {
    let (_temp, _store, kv) = setup_kv();

    put(&*kv, "k", b"").unwrap();

    assert_eq!(kv.get("k").unwrap(), Vec::<u8>::new());
    assert!(kv.has(&["k"]).unwrap().contains("k"));
}

#[test]
fn test_empty_key_rejected() {
    let (_temp, _store, kv) = setup_kv();

    for result in [
        kv.get("").map(|_| ()),
        put(&*kv, "", b"v"),
        kv.delete(""),
    ] {
        let err = result.unwrap_err();
        assert!(matches!(&err, Error::KeyNotFound(k) if k.is_empty()));
        assert_eq!(err.to_string(), "key not found");
    }

    // Nothing was written
    assert!(listed(&*kv, "").is_empty());
    assert!(kv.has(&[""]).unwrap().is_empty());
}

#[test]
fn test_delete() {
    let (_temp, _store, kv) = setup_kv();
    put(&*kv, "k", b"v").unwrap();

    kv.delete("k").unwrap();

    assert!(kv.get("k").unwrap_err().is_not_found());
    let err = kv.delete("k").unwrap_err();
    assert!(matches!(&err, Error::KeyNotFound(k) if k == "k"));
}

#[test]
fn test_has_returns_present_subset() {
    let (_temp, _store, kv) = setup_kv();
    put(&*kv, "a", b"1").unwrap();
    put(&*kv, "c", b"3").unwrap();

    let present = kv.has(&["a", "b", "c", "a"]).unwrap();

    assert_eq!(present.into_iter().collect::<Vec<_>>(), vec!["a", "c"]);
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_list_is_ascending() {
    let (_temp, _store, kv) = setup_kv();
    for key in ["b", "a", "c"] {
        put(&*kv, key, b"v").unwrap();
    }

    assert_eq!(listed(&*kv, ""), vec!["a", "b", "c"]);
    assert_eq!(listed(&*kv, "b"), vec!["b", "c"]);
    assert_eq!(listed(&*kv, "bb"), vec!["c"]);
    assert!(listed(&*kv, "d").is_empty());
}

#[test]
fn test_list_stops_on_break() {
    let (_temp, _store, kv) = setup_kv();
    for key in ["a", "b", "c", "d"] {
        put(&*kv, key, b"v").unwrap();
    }

    let mut seen = Vec::new();
    kv.list("", &mut |key: &str| -> kvmux::Result<ControlFlow<()>> {
        seen.push(key.to_string());
        if key == "b" {
            Ok(ControlFlow::Break(()))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    })
    .unwrap();

    assert_eq!(seen, vec!["a", "b"]);
}

#[test]
fn test_list_propagates_visitor_error() {
    let (_temp, _store, kv) = setup_kv();
    for key in ["a", "b", "c"] {
        put(&*kv, key, b"v").unwrap();
    }

    let mut calls = 0;
    let result = kv.list("", &mut |_key: &str| -> kvmux::Result<ControlFlow<()>> {
        calls += 1;
        Err(Error::Storage("visitor failed".to_string()))
    });

    assert!(matches!(result, Err(Error::Storage(msg)) if msg == "visitor failed"));
    assert_eq!(calls, 1);
}

#[test]
fn test_keys_matches_list() {
    let (_temp, _store, kv) = setup_kv();
    for key in ["delta", "alpha", "charlie", "bravo"] {
        put(&*kv, key, b"v").unwrap();
    }
    kv.delete("charlie").unwrap();

    let pulled: Vec<String> = kv.keys("b").collect::<Result<_, _>>().unwrap();

    assert_eq!(pulled, listed(&*kv, "b"));
    assert_eq!(pulled, vec!["bravo", "delta"]);
}

#[test]
fn test_listing_survives_flush_and_merge() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_with(
        Config::builder()
            .data_dir(temp.path())
            .scan_batch_size(3)
            .auto_merge_interval(None)
            .build(),
    )
    .unwrap();
    let kv = store.kv("paged");

    let mut expected = Vec::new();
    for i in 0..25 {
        let key = format!("key{:03}", i);
        put(&*kv, &key, b"v").unwrap();
        expected.push(key);
        if i % 10 == 9 {
            store.engine().flush().unwrap();
        }
    }
    assert_eq!(listed(&*kv, ""), expected);

    store.engine().merge().unwrap();
    assert_eq!(listed(&*kv, ""), expected);
}

// =============================================================================
// Counting
// =============================================================================

#[test]
fn test_len_counts_puts_minus_deletes() {
    let (_temp, _store, kv) = setup_kv();
    assert!(kv.is_empty().unwrap());

    for i in 0..10 {
        put(&*kv, &format!("k{}", i), b"v").unwrap();
    }
    for i in 0..4 {
        kv.delete(&format!("k{}", i)).unwrap();
    }

    assert_eq!(kv.len().unwrap(), 6);
    assert!(!kv.is_empty().unwrap());
}

#[test]
fn test_single_namespace_store() {
    let temp = TempDir::new().unwrap();
    {
        let kv = Kv::open_with(config(&temp)).unwrap();
        assert!(kv.codec().prefix().is_empty());

        put(&kv, "x", b"1").unwrap();
        put(&kv, "y", b"2").unwrap();
        put(&kv, "z", b"3").unwrap();
        kv.delete("y").unwrap();

        assert_eq!(kv.len().unwrap(), 2);
        assert_eq!(listed(&kv, ""), vec!["x", "z"]);
        kv.close().unwrap();
        assert!(kv.get("x").unwrap_err().is_closed());
    }

    let kv = Kv::open_with(config(&temp)).unwrap();
    assert_eq!(kv.get("z").unwrap(), b"3");
    assert_eq!(kv.len().unwrap(), 2);
    kv.close().unwrap();
}
