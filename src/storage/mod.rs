//! On-disk storage: immutable SSTables, the manager that orders and
//! searches them, and the k-way merge behind compaction.

mod sstable;
mod manager;
mod merge;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::{CompactionStats, StorageManager};
pub use merge::MergeIter;
