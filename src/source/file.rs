//! Streaming file source
//!
//! Reads `chunk_size` bytes at a time directly from storage. The file handle
//! is kept open across passes and rewound at end-of-file. When a read fails
//! the handle is dropped, the pass is abandoned and the next call reopens the
//! file from the beginning, so a bad read never ends the broadcast.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};

use super::{check_chunk_size, Chunk, ChunkSource, Cursor};

/// Source that re-reads the payload from storage on every pass
pub struct FileSource {
    path: PathBuf,
    file: Option<File>,
    buf: Vec<u8>,
    cursor: Cursor,
}

impl FileSource {
    /// Open the payload at `path`
    ///
    /// Fails if the file cannot be opened, is not a regular file, or is empty.
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        check_chunk_size(chunk_size)?;
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path)
            .await
            .map_err(|e| Error::payload(&path, e))?;
        let meta = file.metadata().await.map_err(|e| Error::payload(&path, e))?;
        if !meta.is_file() {
            return Err(Error::payload(
                &path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        if meta.len() == 0 {
            return Err(Error::EmptyPayload(path));
        }

        tracing::debug!(path = %path.display(), size = meta.len(), chunk_size, "Opened streaming source");

        Ok(Self {
            path,
            file: Some(file),
            buf: vec![0; chunk_size],
            cursor: Cursor::default(),
        })
    }

    /// Path of the payload
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill the buffer as far as the file allows
    ///
    /// Short reads are retried so chunk boundaries only depend on the chunk
    /// size and payload length.
    async fn fill(&mut self) -> io::Result<usize> {
        let file = match self.file {
            Some(ref mut file) => file,
            None => self.file.insert(File::open(&self.path).await?),
        };

        let mut filled = 0;
        while filled < self.buf.len() {
            let n = file.read(&mut self.buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    async fn rewind(&mut self) -> io::Result<()> {
        if let Some(ref mut file) = self.file {
            file.seek(SeekFrom::Start(0)).await?;
        }
        Ok(())
    }

    async fn read_chunk(&mut self) -> io::Result<Chunk> {
        let mut filled = self.fill().await?;

        if filled == 0 {
            if self.cursor.offset() == 0 {
                return Err(empty_payload());
            }
            self.rewind().await?;
            self.cursor.wrap();
            filled = self.fill().await?;
            if filled == 0 {
                return Err(empty_payload());
            }
        }

        Ok(self.cursor.emit(Bytes::copy_from_slice(&self.buf[..filled])))
    }
}

fn empty_payload() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "payload is empty")
}

impl ChunkSource for FileSource {
    fn chunk_size(&self) -> usize {
        self.buf.len()
    }

    async fn next_chunk(&mut self) -> io::Result<Chunk> {
        match self.read_chunk().await {
            Ok(chunk) => Ok(chunk),
            Err(e) => {
                // Reopen on the next call and start a fresh pass
                self.file = None;
                self.cursor.restart();
                Err(e)
            }
        }
    }
}
