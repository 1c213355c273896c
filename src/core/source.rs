// src/core/source.rs

//! Random-access byte sources backing the stream, and the per-session cursor
//! that walks them.
//!
//! A source is stateless from the reader's point of view: every read names its
//! absolute offset. Sessions keep their own `PlaybackCursor`, so any number of
//! them can share one open file without disturbing each other.

use super::errors::MediaError;
use bytes::Bytes;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// A read-only, random-access view of the payload served to clients.
pub trait MediaSource: Send + Sync {
    /// The total length of the payload in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads up to `buf.len()` bytes starting at `offset`.
    /// Returns `Ok(0)` once `offset` is at or past the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// A `MediaSource` over one file on disk, opened once for the lifetime of
/// the server.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
    path: PathBuf,
}

impl FileSource {
    /// Opens `path` read-only and records its length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MediaSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len || buf.is_empty() {
            return Ok(0);
        }
        loop {
            match positional::read_at(&self.file, offset, buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

// Positional reads do not move a shared file cursor, which is what lets
// several sessions read the same handle.
#[cfg(unix)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        file.read_at(buf, offset)
    }
}

#[cfg(windows)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        file.seek_read(buf, offset)
    }
}

/// An in-memory source, handy for embedding small payloads.
impl MediaSource for Bytes {
    fn len(&self) -> u64 {
        Bytes::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= Bytes::len(self) {
            return Ok(0);
        }
        let n = buf.len().min(Bytes::len(self) - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

/// The read position of one session inside a `MediaSource`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    offset: u64,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Moves the cursor to an absolute offset. Seeking exactly to the end is
    /// allowed and yields an empty stream; anything beyond it is rejected and
    /// leaves the cursor where it was.
    pub fn seek(&mut self, offset: u64, source: &dyn MediaSource) -> Result<(), MediaError> {
        let len = source.len();
        if offset > len {
            return Err(MediaError::SeekOutOfRange { offset, len });
        }
        self.offset = offset;
        Ok(())
    }

    /// Reads the next chunk into `buf` and advances the cursor past it.
    /// Returns `Ok(0)` at end of source.
    pub fn read_chunk(
        &mut self,
        source: &dyn MediaSource,
        buf: &mut [u8],
    ) -> Result<usize, MediaError> {
        let n = source.read_at(self.offset, buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}
