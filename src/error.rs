//! Error types for kvmux
//!
//! Provides a unified error type for the engine and the key-value adapter.

use std::fmt;

use thiserror::Error;

/// Result type alias using kvmux's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for kvmux operations
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// The engine has been closed; no further operations are possible.
    #[error("store closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Key-Value Contract Errors
    // -------------------------------------------------------------------------
    /// The logical key is absent. An empty string means the key itself was
    /// empty, which is never a valid key.
    #[error("{}", KeyDisplay("not found", .0))]
    KeyNotFound(String),

    /// A non-replacing put found the logical key already present.
    #[error("{}", KeyDisplay("already exists", .0))]
    KeyExists(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    /// Several independent failures reported together.
    #[error("{}", JoinDisplay(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Reports whether this is a "key not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_))
    }

    /// Reports whether this is a "key already exists" condition.
    pub fn is_key_exists(&self) -> bool {
        matches!(self, Error::KeyExists(_))
    }

    /// Reports whether this is the "store closed" condition.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// Combine optional failures into one result.
    ///
    /// No errors gives `Ok(())`, one error is returned as-is, and more than
    /// one are wrapped in [`Error::Multiple`] in the order given.
    pub fn join<I>(errors: I) -> Result<()>
    where
        I: IntoIterator<Item = Option<Error>>,
    {
        let mut errors: Vec<Error> = errors.into_iter().flatten().collect();
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

struct KeyDisplay<'a>(&'static str, &'a str);

impl fmt::Display for KeyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1.is_empty() {
            write!(f, "key {}", self.0)
        } else {
            write!(f, "key {:?} {}", self.1, self.0)
        }
    }
}

struct JoinDisplay<'a>(&'a [Error]);

impl fmt::Display for JoinDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
