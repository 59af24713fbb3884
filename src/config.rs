//! Configuration for kvmux
//!
//! Engine tuning shared by `Engine`, `Kv` and `Store`. Defaults suit a
//! long-lived store: a large memtable and a merge once a minute.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory the engine owns:
    ///   {data_dir}/
    ///     ├── wal.log
    ///     └── sstables/sstable_NNNNNN.sst
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// When appended WAL entries are fsynced
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Approximate memtable bytes that trigger a flush to a new SSTable
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Interval between background merges; `None` disables the worker
    pub auto_merge_interval: Option<Duration>,

    // -------------------------------------------------------------------------
    // Scan Configuration
    // -------------------------------------------------------------------------
    /// Number of keys fetched per refill of a range scan
    pub scan_batch_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// Sync before every write returns
    EveryWrite,

    /// Sync once `count` entries are pending; a crash may lose up to that many
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./kvmux_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 1 << 30, // 1 GiB
            auto_merge_interval: Some(Duration::from_secs(60)),
            scan_batch_size: 256,
        }
    }
}

impl Config {
    /// Start from the defaults
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(Error::Config("memtable_size_limit must be positive".to_string()));
        }
        if self.scan_batch_size == 0 {
            return Err(Error::Config("scan_batch_size must be positive".to_string()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(Error::Config("WAL sync count must be positive".to_string()));
        }
        if self.auto_merge_interval == Some(Duration::ZERO) {
            return Err(Error::Config("auto_merge_interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`Config`]
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Directory holding the WAL and SSTables
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// WAL fsync policy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Flush threshold in bytes
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Background merge period; `None` disables the worker
    pub fn auto_merge_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.auto_merge_interval = interval;
        self
    }

    /// Keys fetched per scan refill
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.config.scan_batch_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
