//! Payload sources
//!
//! A source turns a fixed payload into an endless, looping sequence of
//! [`Chunk`]s. Two strategies are provided:
//!
//! - [`FileSource`] reads fixed-size buffers straight from storage on every
//!   pass, so payloads larger than memory are fine. A read error abandons the
//!   pass and the next call starts again from offset zero.
//! - [`MemorySource`] loads the payload once and hands out zero-copy slices.
//!
//! Both cut chunks at the same deterministic boundaries: every chunk is
//! `chunk_size` bytes except the last one of a pass, which may be shorter.
//! The chunk after the last one of a pass is the first one of the payload;
//! no empty chunk is ever produced at the seam.
//!
//! ```text
//!  payload: [ 0 .. 1600 | 1600 .. 3200 ]
//!  chunks:  #0 (pass 0, off 0)  #1 (pass 0, off 1600)
//!           #2 (pass 1, off 0)  #3 (pass 1, off 1600)  ...
//! ```

pub mod chunk;
pub mod file;
pub mod memory;

use std::future::Future;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{Error, Result};

pub use chunk::Chunk;
pub use file::FileSource;
pub use memory::MemorySource;

/// A restartable, infinite producer of payload chunks
///
/// Implementations own their read position exclusively. Errors are transient:
/// after returning one, the source has already reset itself to the start of
/// the payload and the next call begins a fresh pass.
pub trait ChunkSource: Send + 'static {
    /// Maximum size of a produced chunk
    fn chunk_size(&self) -> usize;

    /// Produce the next chunk, looping to the start after end-of-payload
    fn next_chunk(&mut self) -> impl Future<Output = std::io::Result<Chunk>> + Send;
}

/// How the payload is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// Read from storage on every pass
    #[default]
    Streaming,
    /// Load into memory once at startup
    Buffered,
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" | "stream" | "file" => Ok(SourceMode::Streaming),
            "buffered" | "memory" => Ok(SourceMode::Buffered),
            other => Err(format!(
                "unknown source mode {other:?} (expected \"streaming\" or \"buffered\")"
            )),
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Streaming => write!(f, "streaming"),
            SourceMode::Buffered => write!(f, "buffered"),
        }
    }
}

/// A source chosen at runtime from a [`SourceMode`]
pub enum PayloadSource {
    /// Streaming mode
    File(FileSource),
    /// Buffered mode
    Memory(MemorySource),
}

impl PayloadSource {
    /// Open `path` in the given mode
    ///
    /// Fails if the payload cannot be read or is empty.
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize, mode: SourceMode) -> Result<Self> {
        match mode {
            SourceMode::Streaming => Ok(PayloadSource::File(FileSource::open(path, chunk_size).await?)),
            SourceMode::Buffered => Ok(PayloadSource::Memory(MemorySource::load(path, chunk_size).await?)),
        }
    }

    /// Which strategy this source uses
    pub fn mode(&self) -> SourceMode {
        match self {
            PayloadSource::File(_) => SourceMode::Streaming,
            PayloadSource::Memory(_) => SourceMode::Buffered,
        }
    }
}

impl ChunkSource for PayloadSource {
    fn chunk_size(&self) -> usize {
        match self {
            PayloadSource::File(s) => s.chunk_size(),
            PayloadSource::Memory(s) => s.chunk_size(),
        }
    }

    async fn next_chunk(&mut self) -> std::io::Result<Chunk> {
        match self {
            PayloadSource::File(s) => s.next_chunk().await,
            PayloadSource::Memory(s) => s.next_chunk().await,
        }
    }
}

pub(crate) fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size", "must be greater than zero"));
    }
    Ok(())
}

/// Read position shared by both source strategies
#[derive(Debug, Default)]
pub(crate) struct Cursor {
    sequence: u64,
    pass: u64,
    offset: u64,
}

impl Cursor {
    /// Stamp `data` with the current position and advance past it
    pub(crate) fn emit(&mut self, data: Bytes) -> Chunk {
        let len = data.len() as u64;
        let chunk = Chunk {
            data,
            sequence: self.sequence,
            pass: self.pass,
            offset: self.offset,
        };
        self.sequence += 1;
        self.offset += len;
        chunk
    }

    /// Start the next pass
    pub(crate) fn wrap(&mut self) {
        self.pass += 1;
        self.offset = 0;
    }

    /// Abandon the current pass (no-op if nothing was read yet)
    pub(crate) fn restart(&mut self) {
        if self.offset != 0 {
            self.wrap();
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mode_parse() {
        assert_eq!("streaming".parse::<SourceMode>(), Ok(SourceMode::Streaming));
        assert_eq!("Buffered".parse::<SourceMode>(), Ok(SourceMode::Buffered));
        assert_eq!(" memory ".parse::<SourceMode>(), Ok(SourceMode::Buffered));
        assert!("tape".parse::<SourceMode>().is_err());
    }

    #[test]
    fn test_cursor_wraps_and_counts() {
        let mut cursor = Cursor::default();

        let a = cursor.emit(Bytes::from_static(b"abcd"));
        let b = cursor.emit(Bytes::from_static(b"ef"));
        cursor.wrap();
        let c = cursor.emit(Bytes::from_static(b"abcd"));

        assert_eq!((a.sequence, a.pass, a.offset), (0, 0, 0));
        assert_eq!((b.sequence, b.pass, b.offset), (1, 0, 4));
        assert_eq!((c.sequence, c.pass, c.offset), (2, 1, 0));
    }

    #[test]
    fn test_cursor_restart_at_start_is_noop() {
        let mut cursor = Cursor::default();
        cursor.restart();

        let chunk = cursor.emit(Bytes::from_static(b"x"));
        assert_eq!(chunk.pass, 0);

        cursor.restart();
        let chunk = cursor.emit(Bytes::from_static(b"x"));
        assert_eq!((chunk.pass, chunk.offset), (1, 0));
    }

    #[tokio::test]
    async fn test_payload_source_modes_agree() {
        use std::io::Write;

        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&payload).unwrap();

        let mut streaming = PayloadSource::open(file.path(), 1024, SourceMode::Streaming)
            .await
            .unwrap();
        let mut buffered = PayloadSource::open(file.path(), 1024, SourceMode::Buffered)
            .await
            .unwrap();
        assert_eq!(streaming.mode(), SourceMode::Streaming);
        assert_eq!(buffered.mode(), SourceMode::Buffered);

        for _ in 0..12 {
            let a = streaming.next_chunk().await.unwrap();
            let b = buffered.next_chunk().await.unwrap();
            assert_eq!(a, b);
        }
    }
}
