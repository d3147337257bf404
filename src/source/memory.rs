//! Buffered in-memory source

use std::path::Path;

use bytes::Bytes;

use crate::error::{Error, Result};

use super::{check_chunk_size, Chunk, ChunkSource, Cursor};

/// Source that holds the whole payload in memory
///
/// Chunks are zero-copy slices of the loaded payload.
#[derive(Debug)]
pub struct MemorySource {
    payload: Bytes,
    chunk_size: usize,
    cursor: Cursor,
}

impl MemorySource {
    /// Create a source over an in-memory payload
    pub fn new(payload: Bytes, chunk_size: usize) -> Result<Self> {
        check_chunk_size(chunk_size)?;
        if payload.is_empty() {
            return Err(Error::config("payload", "must not be empty"));
        }

        Ok(Self {
            payload,
            chunk_size,
            cursor: Cursor::default(),
        })
    }

    /// Load the payload at `path` once
    ///
    /// Any failure here is fatal: there is nothing to broadcast.
    pub async fn load(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        check_chunk_size(chunk_size)?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::payload(path, e))?;
        if data.is_empty() {
            return Err(Error::EmptyPayload(path.to_path_buf()));
        }

        tracing::debug!(path = %path.display(), size = data.len(), chunk_size, "Loaded buffered source");

        Self::new(Bytes::from(data), chunk_size)
    }

    /// The whole payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Number of chunks in one pass
    pub fn chunks_per_pass(&self) -> usize {
        self.payload.len().div_ceil(self.chunk_size)
    }

    /// Slice off the next chunk, wrapping at end-of-payload
    pub fn next_slice(&mut self) -> Chunk {
        if self.cursor.offset() as usize >= self.payload.len() {
            self.cursor.wrap();
        }

        let start = self.cursor.offset() as usize;
        let end = (start + self.chunk_size).min(self.payload.len());
        self.cursor.emit(self.payload.slice(start..end))
    }
}

impl ChunkSource for MemorySource {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn next_chunk(&mut self) -> std::io::Result<Chunk> {
        Ok(self.next_slice())
    }
}
