//! Namespace multiplexer
//!
//! A [`Store`] owns one engine and hands out one [`Kv`] per namespace.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};

use super::{KeyCodec, Kv};

/// Many namespaced key-value stores over a single engine
pub struct Store {
    engine: Arc<Engine>,
    /// Namespace name → its one handle
    handles: Mutex<HashMap<Vec<u8>, Arc<Kv>>>,
}

impl Store {
    /// Open the engine at `path` with default settings (large memtable,
    /// background merge once a minute)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(Config::builder().data_dir(path.as_ref()).build())
    }

    /// Open the engine with an explicit config
    pub fn open_with(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Engine::open_shared(config)?,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// The handle for namespace `name`, created on first request.
    ///
    /// Every call with the same name returns the same `Arc`; concurrent first
    /// requests are serialized so only one handle is ever built.
    pub fn kv(&self, name: impl AsRef<[u8]>) -> Arc<Kv> {
        let name = name.as_ref();
        let mut handles = self.handles.lock();
        if let Some(kv) = handles.get(name) {
            return Arc::clone(kv);
        }

        let kv = Arc::new(Kv::shared(
            Arc::clone(&self.engine),
            KeyCodec::for_namespace(name),
        ));
        handles.insert(name.to_vec(), Arc::clone(&kv));
        tracing::debug!(namespace = %String::from_utf8_lossy(name), "Created namespace handle");
        kv
    }

    /// Names of the namespaces handed out so far, sorted
    pub fn namespaces(&self) -> Vec<Vec<u8>> {
        let mut names: Vec<Vec<u8>> = self.handles.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// The shared engine
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Run a final merge, then close the engine. Every handle from this
    /// store fails with `Closed` afterwards.
    pub fn close(&self) -> Result<()> {
        close_engine(&self.engine)
    }
}

/// Merge then close. An already-closed engine during the merge is expected;
/// any other merge failure is reported together with a close failure.
pub(super) fn close_engine(engine: &Engine) -> Result<()> {
    let merge_err = match engine.merge() {
        Ok(_) | Err(Error::Closed) => None,
        Err(e) => Some(e),
    };
    let close_err = engine.close().err();
    Error::join([merge_err, close_err])
}
