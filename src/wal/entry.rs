//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode as a framed record: header followed by the bincode payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len()).map_err(|_| {
            Error::Serialization(format!("WAL payload of {} bytes does not fit a frame", data.len()))
        })?;
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode a complete framed record, verifying length, CRC and LSN
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::WalCorruption(format!(
                "frame of {} bytes is shorter than the header",
                bytes.len()
            )));
        }
        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let data = &bytes[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(Error::WalCorruption(format!(
                "length mismatch: header says {}, frame has {}",
                len,
                data.len()
            )));
        }
        Self::decode_payload(lsn, crc, data)
    }

    /// Verify and decode the payload of a frame whose header was already read
    pub(super) fn decode_payload(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(Error::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| Error::WalCorruption(format!("undecodable entry at LSN {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(Error::WalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

/// Split a header into (lsn, crc, data_len)
pub(super) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    )
}
