//! Key codec
//!
//! Maps logical keys to physical engine keys by prepending a namespace prefix.

/// A fixed namespace prefix applied to every key of one logical store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyCodec {
    prefix: Vec<u8>,
}

impl KeyCodec {
    /// A codec with a caller-chosen raw prefix
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The empty prefix: physical keys equal logical keys
    pub fn unprefixed() -> Self {
        Self::default()
    }

    /// A codec for a named namespace.
    ///
    /// The prefix is the LEB128 length of `name` followed by its bytes. That
    /// makes prefixes self-delimiting: no namespace's prefix is a prefix of
    /// another's, so their key ranges never overlap.
    pub fn for_namespace(name: &[u8]) -> Self {
        let mut prefix = Vec::with_capacity(name.len() + 2);
        let mut len = name.len() as u64;
        loop {
            let byte = (len & 0x7f) as u8;
            len >>= 7;
            if len == 0 {
                prefix.push(byte);
                break;
            }
            prefix.push(byte | 0x80);
        }
        prefix.extend_from_slice(name);
        Self { prefix }
    }

    /// The physical prefix
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Logical → physical
    pub fn add(&self, logical: &str) -> Vec<u8> {
        let mut physical = Vec::with_capacity(self.prefix.len() + logical.len());
        physical.extend_from_slice(&self.prefix);
        physical.extend_from_slice(logical.as_bytes());
        physical
    }

    /// Physical → logical bytes. Callers must check [`KeyCodec::owns`] first;
    /// a key without the prefix comes back unchanged.
    pub fn remove<'a>(&self, physical: &'a [u8]) -> &'a [u8] {
        physical.strip_prefix(self.prefix.as_slice()).unwrap_or(physical)
    }

    /// Whether a physical key belongs to this namespace
    pub fn owns(&self, physical: &[u8]) -> bool {
        physical.starts_with(&self.prefix)
    }
}
