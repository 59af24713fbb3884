//! SSTable Reader
//!
//! Validates a table on open and keeps its whole index in memory; lookups
//! cost one seek and one read.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::memtable::Entry;

use super::iterator::SSTableIterator;
use super::{
    decode_record_header, le_u16, le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC,
    RECORD_HEADER_SIZE, VERSION,
};

/// An open SSTable
pub struct SSTableReader {
    path: PathBuf,
    file: BufReader<File>,
    /// Key → record offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
    /// Data block CRC recorded in the footer
    data_crc: u32,
}

impl SSTableReader {
    /// Open a table, rejecting bad magic, unknown versions, an index offset
    /// outside the file, or an index whose size disagrees with the header
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(Error::Storage(format!(
                "SSTable {} is too short ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(Error::Storage(format!(
                "Invalid SSTable magic: expected KVMX, got {:?}",
                &header[0..4]
            )));
        }

        let version = le_u16(&header[4..6]);
        if version != VERSION {
            return Err(Error::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(Error::Storage(format!(
                "SSTable {} has index offset {} outside the file",
                path.display(),
                index_offset
            )));
        }

        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        // [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos + 12 <= index_data.len() {
            let key_len = le_u32(&index_data[pos..]) as usize;
            let offset = le_u64(&index_data[pos + 4..]);
            pos += 12;
            if pos + key_len > index_data.len() {
                break;
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(Error::Storage(format!(
                "SSTable {} index holds {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
            data_crc,
        })
    }

    /// Look up a key: O(log n) via the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Entry::Value(v)))`: key found with value
    /// - `Ok(Some(Entry::Tombstone))`: key deleted as of this table
    /// - `Ok(None)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Entry>> {
        self.read_entry(key, true)
    }

    /// Like `get`, but never reads value bytes; live values come back empty
    pub fn probe(&mut self, key: &[u8]) -> Result<Option<Entry>> {
        self.read_entry(key, false)
    }

    fn read_entry(&mut self, key: &[u8], with_value: bool) -> Result<Option<Entry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        self.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; RECORD_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let (key_len, value_len) = decode_record_header(&header);

        let value_len = match value_len {
            None => return Ok(Some(Entry::Tombstone)),
            Some(_) if !with_value => return Ok(Some(Entry::Value(Vec::new()))),
            Some(len) => len,
        };

        // The index already matched the key
        self.file.seek_relative(key_len as i64)?;
        let mut value = vec![0u8; value_len];
        self.file.read_exact(&mut value)?;
        Ok(Some(Entry::Value(value)))
    }

    /// Up to `limit` keys (tombstones included) after `from`, ascending
    pub fn keys_from(&self, from: Bound<&[u8]>, limit: usize) -> Vec<Vec<u8>> {
        self.index
            .range::<[u8], _>((from, Bound::Unbounded))
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// False when `key` is outside the table's key range
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let mut keys = self.index.keys();
        match (keys.next(), keys.next_back()) {
            (Some(min), Some(max)) => key >= min.as_slice() && key <= max.as_slice(),
            // A single key is returned by `next` only
            (Some(only), None) => key == only.as_slice(),
            _ => false,
        }
    }

    /// Create an iterator over all entries (for compaction)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset, self.data_crc)
    }
}
