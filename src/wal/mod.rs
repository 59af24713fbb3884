//! Write-Ahead Log
//!
//! Every put and delete is appended here before it reaches the memtable.
//! The log only has to cover the memtable: it is truncated after each flush,
//! and on open whatever it still holds is replayed into a fresh SSTable.
//!
//! ## Frame Layout
//! ```text
//! ┌─────────┬─────────┬─────────┬──────────────────────────┐
//! │ LSN (8) │ CRC (4) │ Len (4) │ bincode(WalEntry) (Len)  │
//! └─────────┴─────────┴─────────┴──────────────────────────┘
//! ```
//!
//! Integers are little-endian and the CRC covers the payload only. LSNs keep
//! increasing across truncation and reopen. A frame cut short at the tail is
//! a torn write and ends the log; a complete frame that fails validation is
//! corruption and is skipped during recovery.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
