//! # kvmux
//!
//! Many independent key-value namespaces over one persistent engine. Each
//! namespace is a key prefix; every namespace handle speaks the same
//! [`KeyValue`] contract.
//!
//! ```text
//!   Store::kv("users") ─┐        Kv::open(path)
//!   Store::kv("jobs")  ─┤              │
//!                       ▼              ▼
//!             KeyCodec: prefix ++ key  (empty prefix)
//!                       │              │
//!                       └──────┬───────┘
//!                              ▼
//!   Engine ── put/delete ──▶ WAL ──▶ MemTable ── flush ──▶ SSTables
//!          ◀── get/scan ───────────── newest wins ──────────┘
//!          ── merge (on close, and every minute by default)
//! ```
//!
//! ```no_run
//! use kvmux::kv::{KeyValue, PutOptions, Store};
//!
//! # fn main() -> kvmux::Result<()> {
//! let store = Store::open("/tmp/kvmux")?;
//! let users = store.kv("users");
//! users.put(PutOptions { key: "alice", data: b"admin", replace: false })?;
//! assert_eq!(users.get("alice")?, b"admin");
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod kv;

pub use error::{Error, Result};
pub use config::Config;
pub use engine::Engine;
pub use kv::{KeyValue, Kv, PutOptions, Store};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
