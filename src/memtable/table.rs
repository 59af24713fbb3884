//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::Entry;

/// In-memory table for recent writes
///
/// Size is approximate: key bytes plus value bytes, tombstones count their key.
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Entry>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock); returns the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.insert(key, Entry::Value(value))
    }

    /// Delete a key by inserting a tombstone (write lock); returns the new size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.insert(key, Entry::Tombstone)
    }

    fn insert(&self, key: Vec<u8>, entry: Entry) -> usize {
        let mut data = self.data.write();
        let added = key.len() + entry_len(&entry);
        let removed = match data.get(&key) {
            Some(old) => key.len() + entry_len(old),
            None => 0,
        };
        data.insert(key, entry);

        // Adjusted under the write lock, so no other writer interleaves
        let size = self.size.load(Ordering::Acquire) + added - removed;
        self.size.store(size, Ordering::Release);
        size
    }

    /// Up to `limit` entries (tombstones included) with keys after `from`
    pub fn range(&self, from: Bound<&[u8]>, limit: usize) -> Vec<(Vec<u8>, Entry)> {
        self.data
            .read()
            .range::<[u8], _>((from, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Check if there is nothing to flush
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, Entry)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Release);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_len(entry: &Entry) -> usize {
    match entry {
        Entry::Value(v) => v.len(),
        Entry::Tombstone => 0,
    }
}
