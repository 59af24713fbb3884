//! SSTables
//!
//! Immutable sorted runs written by memtable flushes and by compaction.
//! Keys are unique within a table; a key may appear in several tables, and
//! the newest table wins.
//!
//! ## Layout
//! ```text
//! header   "KVMX" | version u16 | entry count u64                 14 bytes
//! data     { key_len u32 | value_len u32 | key | value } *
//!          value_len == u32::MAX marks a tombstone with no value bytes
//! index    { key_len u32 | record offset u64 | key } *
//! footer   index offset u64 | data CRC u32 | zero u32             16 bytes
//! ```
//!
//! Point lookups trust the index. Full iteration (compaction) recomputes the
//! data block CRC and fails if it differs from the footer.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

pub(crate) const MAGIC: &[u8; 4] = b"KVMX";
pub(crate) const VERSION: u16 = 1;
pub(crate) const HEADER_SIZE: u64 = 14;
pub(crate) const FOOTER_SIZE: u64 = 16;

/// `value_len` of a tombstone record
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// What `SSTableBuilder::finish` wrote
#[derive(Debug, Clone)]
pub struct SSTable {
    pub path: PathBuf,
    /// Records in the table, tombstones included
    pub entry_count: u64,
    /// First key; empty for an empty table
    pub min_key: Vec<u8>,
    /// Last key; empty for an empty table
    pub max_key: Vec<u8>,
    pub file_size: u64,
}

// =============================================================================
// Record encoding
// =============================================================================

/// Size of a data record's length prefix: key length (4) + value length (4)
pub(crate) const RECORD_HEADER_SIZE: usize = 8;

/// Length prefix of a data record; `None` marks a tombstone
pub(crate) fn encode_record_header(key_len: usize, value_len: Option<usize>) -> [u8; RECORD_HEADER_SIZE] {
    let mut out = [0u8; RECORD_HEADER_SIZE];
    out[..4].copy_from_slice(&(key_len as u32).to_le_bytes());
    let marker = value_len.map_or(TOMBSTONE_MARKER, |len| len as u32);
    out[4..].copy_from_slice(&marker.to_le_bytes());
    out
}

/// Inverse of [`encode_record_header`]
pub(crate) fn decode_record_header(header: &[u8; RECORD_HEADER_SIZE]) -> (usize, Option<usize>) {
    let key_len = le_u32(&header[..4]) as usize;
    match le_u32(&header[4..]) {
        TOMBSTONE_MARKER => (key_len, None),
        len => (key_len, Some(len as usize)),
    }
}

pub(crate) fn le_u16(bytes: &[u8]) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[..2]);
    u16::from_le_bytes(buf)
}

pub(crate) fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
