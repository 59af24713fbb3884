//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Merge all SSTables into one during compaction

use std::collections::BTreeSet;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::memtable::{Entry, MemTable};

use super::{MergeIter, SSTable, SSTableBuilder, SSTableReader};

/// Outcome of a compaction pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    /// Tables that were merged and removed
    pub inputs: usize,
    /// Live entries written to the merged table
    pub live_entries: u64,
    /// Tombstones and shadowed versions dropped
    pub dropped_entries: u64,
}

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock; lookups take it exclusively because
///   readers seek their file handle
/// - `next_sstable_id`: Atomic counter; taken under `id_lock` so table IDs
///   and list order agree
/// - Compaction reads its inputs through private file handles, so lookups
///   only wait for the final swap
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,

    /// Held by a flush from ID allocation until its table is listed.
    /// Compaction takes it to snapshot inputs and reserve its output ID, so
    /// no table outside the snapshot ever gets a lower ID than the output.
    id_lock: Mutex<()>,

    /// Set by flushes; compaction is skipped while unset
    dirty: AtomicBool,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove leftovers of an interrupted compaction
    /// 3. Open readers for each SSTable (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().map_or(false, |ext| ext == Self::TEMP_EXTENSION) {
                tracing::warn!(path = %file_path.display(), "Removing unfinished compaction output");
                fs::remove_file(&file_path)?;
            } else if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            sstables.push(SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            dirty: AtomicBool::new(!sstables.is_empty()),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
            id_lock: Mutex::new(()),
        })
    }

    /// Look up a key across all SSTables, newest → oldest
    ///
    /// Returns the newest entry (value or tombstone), or `None` if no table
    /// holds the key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.lookup(key, true)
    }

    /// Like `get`, without reading value bytes
    pub fn probe(&self, key: &[u8]) -> Result<Option<Entry>> {
        self.lookup(key, false)
    }

    fn lookup(&self, key: &[u8], with_value: bool) -> Result<Option<Entry>> {
        let mut sstables = self.sstables.write();
        Self::lookup_in(&mut sstables, key, with_value)
    }

    fn lookup_in(
        sstables: &mut [SSTableReader],
        key: &[u8],
        with_value: bool,
    ) -> Result<Option<Entry>> {
        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            let found = if with_value {
                reader.get(key)?
            } else {
                reader.probe(key)?
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// The first `limit` distinct keys after `from` across all tables, each
    /// resolved to its newest entry. Tombstones are included so callers can
    /// let them shadow nothing older than themselves.
    pub fn scan(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        with_values: bool,
    ) -> Result<Vec<(Vec<u8>, Entry)>> {
        let mut sstables = self.sstables.write();

        let mut keys = BTreeSet::new();
        for reader in sstables.iter() {
            keys.extend(reader.keys_from(from, limit));
        }

        let mut out = Vec::with_capacity(limit.min(keys.len()));
        for key in keys.into_iter().take(limit) {
            if let Some(entry) = Self::lookup_in(&mut sstables, &key, with_values)? {
                out.push((key, entry));
            }
        }
        Ok(out)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(Error::Storage("Cannot flush empty MemTable".to_string()));
        }

        let _id_guard = self.id_lock.lock();
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            builder.add_entry(&key, &entry)?;
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&path)?;

        self.sstables.write().insert(0, reader);
        self.dirty.store(true, Ordering::Release);

        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "Flushed memtable to SSTable"
        );
        Ok(metadata)
    }

    /// Merge every current SSTable into one
    ///
    /// Tables flushed while the merge runs are newer than every input and stay
    /// in front of the merged table. Since all older data takes part,
    /// tombstones can be dropped. Returns `None` when there was nothing to do.
    pub fn compact(&self) -> Result<Option<CompactionStats>> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }

        let (inputs, id) = {
            let _id_guard = self.id_lock.lock();
            let inputs: Vec<PathBuf> = self
                .sstables
                .read()
                .iter()
                .map(|r| r.path().to_path_buf())
                .collect();
            if inputs.is_empty() {
                return Ok(None);
            }
            (inputs, self.next_sstable_id.fetch_add(1, Ordering::SeqCst))
        };

        match self.merge_tables(&inputs, id) {
            Ok(stats) => Ok(Some(stats)),
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    fn merge_tables(&self, inputs: &[PathBuf], id: u64) -> Result<CompactionStats> {
        let final_path = self.sstable_path(id);
        let temp_path = final_path.with_extension(Self::TEMP_EXTENSION);

        let mut readers = inputs
            .iter()
            .map(|p| SSTableReader::open(p))
            .collect::<Result<Vec<_>>>()?;
        let total: u64 = readers.iter().map(|r| r.entry_count()).sum();
        let sources = readers
            .iter_mut()
            .map(|r| r.iter())
            .collect::<Result<Vec<_>>>()?;

        let mut builder = SSTableBuilder::new(&temp_path)?;
        for item in MergeIter::new(sources) {
            let (key, entry) = item?;
            if let Entry::Value(value) = entry {
                builder.add(&key, &value)?;
            }
        }
        let live_entries = builder.entry_count();

        let merged = if live_entries > 0 {
            builder.finish()?;
            fs::rename(&temp_path, &final_path)?;
            Some(SSTableReader::open(&final_path)?)
        } else {
            drop(builder);
            fs::remove_file(&temp_path)?;
            None
        };

        {
            let mut sstables = self.sstables.write();
            // Inputs are the oldest tables, at the tail of the list
            let keep = sstables.len().saturating_sub(inputs.len());
            sstables.truncate(keep);
            sstables.extend(merged);
        }

        for path in inputs {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove merged SSTable");
            }
        }

        let stats = CompactionStats {
            inputs: inputs.len(),
            live_entries,
            dropped_entries: total - live_entries,
        };
        tracing::debug!(
            id,
            inputs = stats.inputs,
            live = stats.live_entries,
            dropped = stats.dropped_entries,
            "Compacted SSTables"
        );
        Ok(stats)
    }

    /// Drop every open reader; later lookups see an empty storage layer
    pub fn release(&self) {
        self.sstables.write().clear();
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    const TEMP_EXTENSION: &'static str = "tmp";

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
