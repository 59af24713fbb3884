//! Background merge worker
//!
//! Runs `Engine::merge` on a fixed interval. The worker only holds a weak
//! reference, so it never keeps a dropped engine alive.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;

use crate::error::{Error, Result};

use super::Engine;

/// Handle to the merge thread; dropping it signals the thread to exit
pub(super) struct MergeWorker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MergeWorker {
    pub(super) fn spawn(engine: Weak<Engine>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("kvmux-merge".to_string())
            .spawn(move || {
                tracing::debug!(?interval, "Auto-merge worker started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let Some(engine) = engine.upgrade() else { break };
                            match engine.merge() {
                                Ok(Some(stats)) => tracing::debug!(
                                    inputs = stats.inputs,
                                    dropped = stats.dropped_entries,
                                    "Auto-merge finished"
                                ),
                                Ok(None) => {}
                                Err(Error::Closed) => break,
                                Err(e) => tracing::warn!(error = %e, "Auto-merge failed"),
                            }
                        }
                        // Fires on send or when the sender is dropped
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("Auto-merge worker stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for an in-flight merge to finish
    pub(super) fn stop(mut self) {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            // The last strong reference can be released on the worker itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("Auto-merge worker panicked");
            }
        }
    }
}
