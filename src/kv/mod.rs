//! Key-Value Adapter
//!
//! A uniform key-value contract over the engine, optionally multiplexing many
//! independent namespaces onto one engine through key prefixes.
//!
//! ```text
//!   Store ──owns──▶ Arc<Engine>
//!     │
//!     ├── kv("a") ──▶ Kv { codec: [1]"a", engine }   physical: 0x01 'a' ++ key
//!     └── kv("bc") ─▶ Kv { codec: [2]"bc", engine }  physical: 0x02 'b' 'c' ++ key
//! ```
//!
//! Empty keys are never valid: every operation given one reports
//! [`Error::KeyNotFound`](crate::Error::KeyNotFound) without touching the
//! engine.

mod codec;
mod handle;
mod store;

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use crate::error::Result;

pub use codec::KeyCodec;
pub use handle::{Keys, Kv};
pub use store::Store;

/// Arguments to [`KeyValue::put`]
#[derive(Debug, Clone, Copy)]
pub struct PutOptions<'a> {
    pub key: &'a str,
    pub data: &'a [u8],
    /// Overwrite an existing value instead of failing with `KeyExists`
    pub replace: bool,
}

/// The key-value contract every namespace handle provides.
///
/// - `put` with `replace == false` is check-then-act, not compare-and-swap:
///   two racing writers may both see the key absent and both write.
/// - `delete` likewise probes before deleting so it can report absence.
/// - Engine failures pass through unchanged.
pub trait KeyValue: Send + Sync {
    /// Fetch the value for `key`, or `KeyNotFound` carrying the logical key.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// The subset of `keys` that are present. Absent keys are omitted; an
    /// engine error fails the whole call.
    fn has(&self, keys: &[&str]) -> Result<BTreeSet<String>>;

    /// Store `opts.data` under `opts.key`.
    fn put(&self, opts: PutOptions<'_>) -> Result<()>;

    /// Remove `key`, or `KeyNotFound` if it was not there.
    fn delete(&self, key: &str) -> Result<()>;

    /// Push-style listing: call `visit` for each key >= `start`, ascending.
    /// `ControlFlow::Break` ends the listing without error; an error from
    /// `visit` ends it and is returned.
    fn list(
        &self,
        start: &str,
        visit: &mut dyn FnMut(&str) -> Result<ControlFlow<()>>,
    ) -> Result<()>;

    /// Pull-style listing over the same keys, in the same order, as `list`.
    fn keys<'a>(&'a self, start: &str) -> Box<dyn Iterator<Item = Result<String>> + 'a>;

    /// Number of keys in this namespace.
    fn len(&self) -> Result<u64>;

    /// Whether the namespace holds no keys.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Release resources owned by this handle.
    fn close(&self) -> Result<()>;
}
