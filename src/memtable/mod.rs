//! MemTable
//!
//! Writes land here after the WAL and stay until the next flush. Deletes are
//! kept as tombstones so they keep hiding older SSTable versions, and range
//! reads are bounded so a scan never copies more than one batch.

mod table;

pub use table::MemTable;

/// A versioned slot for a key, shared by the memtable and SSTable lookups
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl Entry {
    /// True for a live value
    pub fn is_live(&self) -> bool {
        matches!(self, Entry::Value(_))
    }

    /// The value, if live
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }
}
