//! Namespace handle
//!
//! [`Kv`] binds one [`KeyCodec`] to a shared engine and implements the
//! key-value contract inside that namespace.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{Engine, Scan, ScanMode};
use crate::error::{Error, Result};

use super::store::close_engine;
use super::{KeyCodec, KeyValue, PutOptions};

/// How the handle relates to its engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Sole user of the engine; owns its lifecycle
    Exclusive,
    /// One of possibly many namespaces on a `Store`'s engine
    Shared,
}

/// A key-value store scoped to one namespace of an engine
pub struct Kv {
    engine: Arc<Engine>,
    codec: KeyCodec,
    scope: Scope,
}

impl Kv {
    /// Open a single-namespace store at `path` with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(Config::builder().data_dir(path.as_ref()).build())
    }

    /// Open a single-namespace store that owns its engine.
    ///
    /// Keys are stored unprefixed and `len` reads the engine's key count.
    pub fn open_with(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Engine::open_shared(config)?,
            codec: KeyCodec::unprefixed(),
            scope: Scope::Exclusive,
        })
    }

    pub(super) fn shared(engine: Arc<Engine>, codec: KeyCodec) -> Self {
        Self {
            engine,
            codec,
            scope: Scope::Shared,
        }
    }

    /// The codec mapping this namespace's keys
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// The underlying engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Lazily iterate logical keys >= `start` in this namespace, ascending.
    ///
    /// The scan stops at the first physical key outside the namespace.
    /// Dropping the iterator early ends the scan.
    pub fn scan(&self, start: &str) -> Keys<'_> {
        Keys {
            scan: self.engine.scan(&self.codec.add(start), ScanMode::KeysOnly),
            codec: &self.codec,
            done: false,
        }
    }

    fn physical(&self, key: &str) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(Error::KeyNotFound(String::new()));
        }
        Ok(self.codec.add(key))
    }
}

impl KeyValue for Kv {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let pkey = self.physical(key)?;
        self.engine
            .get(&pkey)?
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn has(&self, keys: &[&str]) -> Result<BTreeSet<String>> {
        // Fails after close even when no key reaches the engine
        self.engine.ensure_open()?;
        let mut present = BTreeSet::new();
        for &key in keys {
            if key.is_empty() {
                continue;
            }
            if self.engine.exists(&self.codec.add(key))? {
                present.insert(key.to_string());
            }
        }
        Ok(present)
    }

    fn put(&self, opts: PutOptions<'_>) -> Result<()> {
        let pkey = self.physical(opts.key)?;
        if !opts.replace && self.engine.exists(&pkey)? {
            return Err(Error::KeyExists(opts.key.to_string()));
        }
        self.engine.put(&pkey, opts.data)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let pkey = self.physical(key)?;
        if !self.engine.exists(&pkey)? {
            return Err(Error::KeyNotFound(key.to_string()));
        }
        self.engine.delete(&pkey)
    }

    fn list(
        &self,
        start: &str,
        visit: &mut dyn FnMut(&str) -> Result<ControlFlow<()>>,
    ) -> Result<()> {
        for key in self.scan(start) {
            if visit(key?.as_str())?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn keys<'a>(&'a self, start: &str) -> Box<dyn Iterator<Item = Result<String>> + 'a> {
        Box::new(self.scan(start))
    }

    fn len(&self) -> Result<u64> {
        match self.scope {
            Scope::Exclusive => Ok(self.engine.stat()?.keys_num),
            // The engine count covers every namespace
            Scope::Shared => {
                let mut n = 0;
                for key in self.scan("") {
                    key?;
                    n += 1;
                }
                Ok(n)
            }
        }
    }

    /// Closes the engine for a handle from [`Kv::open`]; a no-op for handles
    /// handed out by a [`Store`](super::Store), which owns the engine.
    fn close(&self) -> Result<()> {
        match self.scope {
            Scope::Exclusive => close_engine(&self.engine),
            Scope::Shared => Ok(()),
        }
    }
}

impl fmt::Debug for Kv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kv")
            .field("prefix", &self.codec.prefix())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Ascending logical keys of one namespace; see [`Kv::scan`]
pub struct Keys<'a> {
    scan: Scan<'a>,
    codec: &'a KeyCodec,
    done: bool,
}

impl Iterator for Keys<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let physical = match self.scan.next() {
            Some(Ok((key, _))) => key,
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        // Prefixes group physical keys, so the first foreign key ends the range
        if !self.codec.owns(&physical) {
            self.done = true;
            return None;
        }

        match String::from_utf8(self.codec.remove(&physical).to_vec()) {
            Ok(key) => Some(Ok(key)),
            Err(e) => {
                self.done = true;
                Some(Err(Error::Storage(format!("stored key is not UTF-8: {}", e))))
            }
        }
    }
}
