//! SSTable Builder
//!
//! Streams sorted entries into a new table file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::memtable::Entry;

use super::{encode_record_header, SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Writes one SSTable; keys must arrive in strictly ascending order
pub struct SSTableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Offset the next record is written at
    offset: u64,
    /// Key → record offset, in key order
    index: Vec<(Vec<u8>, u64)>,
    /// CRC over the data block
    crc: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create the file and write a header whose count is patched by `finish`
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            offset: HEADER_SIZE,
            index: Vec::new(),
            crc: crc32fast::Hasher::new(),
        })
    }

    /// Add a live value
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(key, Some(value))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.append(key, None)
    }

    /// Add either kind of entry
    pub fn add_entry(&mut self, key: &[u8], entry: &Entry) -> Result<()> {
        match entry {
            Entry::Value(v) => self.add(key, v),
            Entry::Tombstone => self.add_tombstone(key),
        }
    }

    /// Reject a key or value whose length does not fit a record header.
    /// `u32::MAX` is reserved as the tombstone marker.
    pub fn check_lengths(key_len: usize, value_len: usize) -> Result<()> {
        for (what, len) in [("key", key_len), ("value", value_len)] {
            match u32::try_from(len) {
                Ok(n) if n != TOMBSTONE_MARKER => {}
                _ => {
                    return Err(Error::Storage(format!(
                        "{} of {} bytes is too large for an SSTable record",
                        what, len
                    )))
                }
            }
        }
        Ok(())
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> u64 {
        self.index.len() as u64
    }

    fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(Error::Storage(format!(
                    "SSTable keys out of order: {:?} after {:?}",
                    key, last
                )));
            }
        }
        Self::check_lengths(key.len(), value.map_or(0, <[u8]>::len))?;

        let header = encode_record_header(key.len(), value.map(<[u8]>::len));
        let value = value.unwrap_or_default();
        for part in [&header[..], key, value] {
            self.writer.write_all(part)?;
            self.crc.update(part);
        }

        self.index.push((key.to_vec(), self.offset));
        self.offset += (header.len() + key.len() + value.len()) as u64;
        Ok(())
    }

    /// Write the index block and footer, patch the entry count, and sync
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.offset;
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&self.crc.clone().finalize().to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| Error::Storage(format!("Failed to flush SSTable: {}", e)))?;
        let entry_count = self.index.len() as u64;
        file.seek(SeekFrom::Start(MAGIC.len() as u64 + 2))?;
        file.write_all(&entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        let key_at = |pos: Option<&(Vec<u8>, u64)>| pos.map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            min_key: key_at(self.index.first()),
            max_key: key_at(self.index.last()),
            path: self.path,
            entry_count,
            file_size,
        })
    }
}
