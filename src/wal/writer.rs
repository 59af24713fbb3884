//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::WalSyncStrategy;
use crate::error::{Error, Result};

use super::{Operation, WalEntry, WalReader};

/// Writes entries to the WAL file
pub struct WalWriter {
    writer: BufWriter<File>,
    /// LSN that the next append will receive
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Open or create a WAL file, appending after any existing entries
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut last_lsn = 0;
        if path.exists() {
            let mut reader = WalReader::open(path)?;
            loop {
                match reader.next_entry() {
                    Ok(Some(entry)) => last_lsn = last_lsn.max(entry.lsn),
                    Ok(None) => break,
                    Err(Error::WalCorruption(_)) => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_lsn: last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation, returning the LSN it was assigned
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let frame = WalEntry::new(lsn, operation).serialize()?;
        self.writer.write_all(&frame)?;
        self.current_lsn += 1;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if due {
            self.sync()?;
        }
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard all entries (their effects are durable elsewhere).
    /// LSNs keep increasing across truncations.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries written since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }
}
