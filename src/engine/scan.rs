//! Range Scans
//!
//! Lazy ascending iteration over live entries. The scan pulls a bounded batch
//! of keys from the engine each time its buffer runs dry, so no engine lock is
//! held between elements and dropping the iterator releases everything.

use std::collections::VecDeque;
use std::ops::Bound;

use crate::error::Result;

use super::Engine;

/// What a scan materializes for each key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Keys only; values come back empty and are never read from disk
    KeysOnly,
    /// Keys and their values
    KeysAndValues,
}

/// Ascending iterator over `(key, value)` pairs with key >= start
pub struct Scan<'a> {
    engine: &'a Engine,
    mode: ScanMode,
    start: Vec<u8>,
    /// Last key fetched so far; the next batch begins after it
    cursor: Option<Vec<u8>>,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl<'a> Scan<'a> {
    pub(super) fn new(engine: &'a Engine, start: &[u8], mode: ScanMode) -> Self {
        Self {
            engine,
            mode,
            start: start.to_vec(),
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        let from = match &self.cursor {
            None => Bound::Included(self.start.as_slice()),
            Some(last) => Bound::Excluded(last.as_slice()),
        };
        let batch = self.engine.scan_batch(
            from,
            self.engine.config().scan_batch_size,
            self.mode == ScanMode::KeysAndValues,
        )?;

        match batch.last_key {
            Some(last) => self.cursor = Some(last),
            None => self.exhausted = true,
        }
        self.buffer.extend(batch.entries);
        Ok(())
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            if self.exhausted {
                return None;
            }
            // A batch may be all tombstones; keep going until data or the end
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

/// One refill worth of scan results
pub(crate) struct ScanBatch {
    /// Live entries, ascending
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
    /// Largest key examined (live or not); `None` once the range is drained
    pub last_key: Option<Vec<u8>>,
}
