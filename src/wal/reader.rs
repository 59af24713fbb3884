//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

use super::entry::{parse_header, HEADER_SIZE};
use super::WalEntry;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last complete frame (valid or corrupted)
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a valid entry
    /// - `Ok(None)`: end of log, or an incomplete frame at the tail
    /// - `Err(WalCorruption)`: a complete frame that failed validation;
    ///   the reader has moved past it and may continue
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        if !read_full(&mut self.reader, &mut header)? {
            return Ok(None);
        }
        let (lsn, crc, len) = parse_header(&header);

        // A length running past the end of the file is a torn write, not data
        let frame_end = self.position + HEADER_SIZE as u64 + len as u64;
        if frame_end > self.file_len {
            return Ok(None);
        }

        let mut data = vec![0u8; len as usize];
        if !read_full(&mut self.reader, &mut data)? {
            return Ok(None);
        }
        self.position = frame_end;

        WalEntry::decode_payload(lsn, crc, &data).map(Some)
    }

    /// Offset just past the last complete frame read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total file length at open time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Iterate over all valid entries, stopping at the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` completely; `Ok(false)` if the file ended first
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}
