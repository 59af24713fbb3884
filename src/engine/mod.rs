//! Engine Module
//!
//! The physical storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup
//! - Ordered range scans, key statistics and compaction ("merge")

mod scan;
mod worker;

use std::cmp::Ordering as KeyOrder;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::memtable::{Entry, MemTable};
use crate::storage::{CompactionStats, SSTableBuilder, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};

pub use scan::{Scan, ScanMode};
pub(crate) use scan::ScanBatch;
use worker::MergeWorker;

/// Point-in-time engine statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Number of live keys across the whole engine
    pub keys_num: u64,
    /// Number of SSTables on disk
    pub sstable_count: usize,
    /// Approximate bytes held in the memtable
    pub memtable_bytes: usize,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get/exists/scan): No write_lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - StorageManager locks its table list per lookup
///
/// - **Merge**: Serialized by `merge_lock`; holds `write_lock` only while
///   flushing the memtable, then compacts without blocking writers
///
/// Once closed, every operation fails with [`Error::Closed`].
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations (put/delete/flush)
    write_lock: Mutex<()>,

    /// Serializes merges with each other and with close
    merge_lock: Mutex<()>,

    /// Live key count, maintained by put/delete
    live_keys: AtomicU64,

    closed: AtomicBool,

    /// Background merge thread, if one was started
    worker: Mutex<Option<MergeWorker>>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists and flush the recovered entries
    /// 4. Count live keys
    ///
    /// No background merge worker is started; see [`Engine::open_shared`].
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                }
            }

            // Make recovered data durable in an SSTable before the WAL is reset
            if !memtable.is_empty() {
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        let engine = Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            merge_lock: Mutex::new(()),
            live_keys: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            worker: Mutex::new(None),
        };

        let mut live = 0u64;
        for item in engine.scan(&[], ScanMode::KeysOnly) {
            item?;
            live += 1;
        }
        engine.live_keys.store(live, Ordering::Release);

        tracing::info!(
            path = %engine.config.data_dir.display(),
            keys = live,
            sstables = engine.storage.sstable_count(),
            "Engine opened"
        );
        Ok(engine)
    }

    /// Open an engine for sharing, starting the background merge worker when
    /// `auto_merge_interval` is set
    pub fn open_shared(config: Config) -> Result<Arc<Self>> {
        let interval = config.auto_merge_interval;
        let engine = Arc::new(Self::open(config)?);
        if let Some(interval) = interval {
            let worker = MergeWorker::spawn(Arc::downgrade(&engine), interval)?;
            *engine.worker.lock() = Some(worker);
        }
        Ok(engine)
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Get a value by key; `None` means the key is missing
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }
        Ok(self.storage.get(key)?.and_then(Entry::into_value))
    }

    /// Check whether a key is present without reading its value
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        self.exists_unchecked(key)
    }

    fn exists_unchecked(&self, key: &[u8]) -> Result<bool> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.is_live());
        }
        Ok(self.storage.probe(key)?.map_or(false, |e| e.is_live()))
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Check if flush needed
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // Must fit an SSTable record, or every later flush would fail
        SSTableBuilder::check_lengths(key.len(), value.len())?;

        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        let existed = self.exists_unchecked(key)?;
        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        let new_size = self.memtable.put(key.to_vec(), value.to_vec());
        if !existed {
            self.live_keys.fetch_add(1, Ordering::AcqRel);
        }
        tracing::trace!(key_len = key.len(), value_len = value.len(), "put");

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Delete a key; deleting a missing key is a no-op
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        if !self.exists_unchecked(key)? {
            return Ok(());
        }
        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;
        let new_size = self.memtable.delete(key.to_vec());
        self.live_keys.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(key_len = key.len(), "delete");

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }
        Ok(())
    }

    // =========================================================================
    // Range Scans
    // =========================================================================

    /// Lazily iterate live entries with key >= `start`, ascending
    pub fn scan(&self, start: &[u8], mode: ScanMode) -> Scan<'_> {
        Scan::new(self, start, mode)
    }

    /// Visit entries with key >= `start` in ascending order until `f`
    /// returns `false`. An error from `f` stops the scan and is returned.
    pub fn ascend_from<F>(&self, start: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        for item in self.scan(start, ScanMode::KeysAndValues) {
            let (key, value) = item?;
            if !f(&key, &value)? {
                break;
            }
        }
        Ok(())
    }

    /// Fetch the next `limit` keys after `from`, merging memtable and tables
    pub(crate) fn scan_batch(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        with_values: bool,
    ) -> Result<ScanBatch> {
        self.ensure_open()?;

        // MemTable first: a concurrent flush moves entries into a new table
        // before clearing the memtable, so nothing is missed in between
        let recent = self.memtable.range(from, limit);
        let stored = self.storage.scan(from, limit, with_values)?;

        let mut merged = Vec::with_capacity(limit);
        let mut recent = recent.into_iter().peekable();
        let mut stored = stored.into_iter().peekable();
        while merged.len() < limit {
            let next = match (recent.peek(), stored.peek()) {
                (None, None) => break,
                (Some(_), None) => recent.next(),
                (None, Some(_)) => stored.next(),
                (Some((a, _)), Some((b, _))) => match a.cmp(b) {
                    KeyOrder::Less => recent.next(),
                    KeyOrder::Greater => stored.next(),
                    KeyOrder::Equal => {
                        // MemTable is newer
                        stored.next();
                        recent.next()
                    }
                },
            };
            merged.extend(next);
        }

        let last_key = merged.last().map(|(k, _)| k.clone());
        let entries = merged
            .into_iter()
            .filter_map(|(key, entry)| match entry {
                Entry::Value(v) if with_values => Some((key, v)),
                Entry::Value(_) => Some((key, Vec::new())),
                Entry::Tombstone => None,
            })
            .collect();

        Ok(ScanBatch { entries, last_key })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Current statistics; `keys_num` is O(1)
    pub fn stat(&self) -> Result<Stat> {
        self.ensure_open()?;
        Ok(Stat {
            keys_num: self.live_keys.load(Ordering::Acquire),
            sstable_count: self.storage.sstable_count(),
            memtable_bytes: self.memtable.size(),
        })
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in an SSTable
        self.wal.lock().truncate()?;
        Ok(())
    }

    /// Compact everything written so far into a single SSTable, dropping
    /// deleted and overwritten entries. Blocks until done.
    pub fn merge(&self) -> Result<Option<CompactionStats>> {
        self.ensure_open()?;
        let _merge_guard = self.merge_lock.lock();
        {
            let _write_guard = self.write_lock.lock();
            self.ensure_open()?;
            self.flush_internal()?;
        }
        self.storage.compact()
    }

    /// Close the engine gracefully
    ///
    /// Stops the merge worker, flushes pending data, syncs the WAL and
    /// releases SSTable handles. Closing an already closed engine is a no-op.
    pub fn close(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop();
        }

        let _merge_guard = self.merge_lock.lock();
        let _write_guard = self.write_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let flushed = self.flush_internal();
        let synced = self.wal.lock().sync();
        self.storage.release();

        tracing::info!(path = %self.config.data_dir.display(), "Engine closed");
        Error::join([flushed.err(), synced.err()])
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// `Err(Closed)` once `close` has run
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
