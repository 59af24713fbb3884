//! SSTable Iterator
//!
//! Sequential scan of a table's data block, checked against the footer CRC.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::memtable::Entry;

use super::{decode_record_header, HEADER_SIZE, RECORD_HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order
///
/// After the last record the data block checksum is compared with the one in
/// the footer; a mismatch is yielded as a final `Err`.
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Start of the index block
    end: u64,
    offset: u64,
    crc: crc32fast::Hasher,
    expected_crc: u32,
    done: bool,
}

impl<'a> SSTableIterator<'a> {
    pub(super) fn new(file: &'a mut BufReader<File>, end: u64, expected_crc: u32) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end,
            offset: HEADER_SIZE,
            crc: crc32fast::Hasher::new(),
            expected_crc,
            done: false,
        })
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        self.crc.update(&buf);
        self.offset += len as u64;
        Ok(buf)
    }

    fn read_record(&mut self) -> Result<(Vec<u8>, Entry)> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        header.copy_from_slice(&self.read_exact(RECORD_HEADER_SIZE)?);
        let (key_len, value_len) = decode_record_header(&header);

        let key = self.read_exact(key_len)?;
        let entry = match value_len {
            Some(len) => Entry::Value(self.read_exact(len)?),
            None => Entry::Tombstone,
        };
        Ok((key, entry))
    }

    fn verify(&mut self) -> Result<()> {
        let actual = std::mem::take(&mut self.crc).finalize();
        if actual != self.expected_crc {
            return Err(Error::Storage(format!(
                "SSTable data checksum mismatch: expected {:#010x}, got {:#010x}",
                self.expected_crc, actual
            )));
        }
        Ok(())
    }
}

impl Iterator for SSTableIterator<'_> {
    type Item = Result<(Vec<u8>, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = if self.offset < self.end {
            self.read_record()
        } else {
            self.done = true;
            return self.verify().err().map(Err);
        };
        if item.is_err() {
            // A half-read record leaves the file position unknown
            self.done = true;
        }
        Some(item)
    }
}
