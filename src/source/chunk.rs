//! Chunk type

use bytes::Bytes;

/// One slice of the payload, the unit of delivery
///
/// Cloning is cheap: `Bytes` is reference counted and immutable, so every
/// consumer queue holds its own handle and nobody can observe another
/// consumer's reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Payload bytes
    pub data: Bytes,
    /// Position in the sequence produced by one source, starting at 0
    pub sequence: u64,
    /// Pass number (how many times the payload looped before this chunk)
    pub pass: u64,
    /// Byte offset of this chunk within the payload
    pub offset: u64,
}

impl Chunk {
    /// Number of bytes in this chunk
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length chunk (sources never emit one)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this chunk begins a pass
    pub fn is_pass_start(&self) -> bool {
        self.offset == 0
    }
}

impl From<Chunk> for Bytes {
    fn from(chunk: Chunk) -> Self {
        chunk.data
    }
}
