//! Chunks and the outcome of a single source read.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// An immutable buffer of bytes read from a source in one step.
///
/// Cloning a chunk is cheap; the bytes are shared, never copied.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    data: Arc<[u8]>,
}

impl Chunk {
    /// Create a chunk that takes ownership of `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::from(bytes),
        }
    }

    /// Number of bytes in the chunk.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the chunk contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy the chunk contents into an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Chunk {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: Arc::from(bytes),
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk").field("len", &self.len()).finish()
    }
}

/// Result of asking a source for its next chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were read. Never empty.
    Chunk(Chunk),
    /// The source is exhausted and closed. Not an error.
    EndOfSource,
}

impl ReadOutcome {
    /// Check if this outcome marks the end of the source.
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::EndOfSource)
    }

    /// Extract the chunk, if any.
    pub fn into_chunk(self) -> Option<Chunk> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::EndOfSource => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_shares_bytes_on_clone() {
        let chunk = Chunk::new(vec![1, 2, 3]);
        let copy = chunk.clone();

        assert_eq!(chunk, copy);
        assert_eq!(copy.as_bytes(), &[1, 2, 3]);
        assert_eq!(copy.len(), 3);
        assert!(!copy.is_empty());
    }

    #[test]
    fn test_chunk_debug_hides_contents() {
        let chunk = Chunk::from(&[0u8; 4096][..]);
        assert_eq!(format!("{:?}", chunk), "Chunk { len: 4096 }");
    }

    #[test]
    fn test_read_outcome_helpers() {
        assert!(ReadOutcome::EndOfSource.is_end());
        assert_eq!(ReadOutcome::EndOfSource.into_chunk(), None);

        let outcome = ReadOutcome::Chunk(Chunk::new(vec![7]));
        assert!(!outcome.is_end());
        assert_eq!(outcome.into_chunk().map(|c| c.to_vec()), Some(vec![7]));
    }
}
