//! The positional file-read external collaborator interface.
//!
//! Raw file I/O is out of scope for this crate (§1): callers hand us anything that can
//! perform `read_at(offset, size)`. We ship two implementations — one over a real
//! [`std::fs::File`] for production use, one over an in-memory `Vec<u8>` for tests and
//! for small already-buffered inputs — but callers may supply their own.

use crate::error::{IoError, Result};
use std::fs::File;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::Path;

/// A source of bytes addressable by absolute offset, performing one blocking read per
/// call and reporting short reads as errors rather than silently returning a short
/// buffer.
pub trait PositionalReader: Send + Sync {
    /// Reads exactly `size` bytes starting at `offset`.
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>>;

    /// Total length of the underlying source, in bytes.
    fn len(&self) -> u64;

    /// Whether the underlying source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`PositionalReader`] backed by a real file.
pub struct FileReader {
    file: File,
    len: u64,
}

impl FileReader {
    /// Opens `path` for positional reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl PositionalReader for FileReader {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let got = self.file.read_at(&mut buf, offset)?;
        if got != size {
            return Err(IoError::ShortRead {
                offset,
                requested: size,
                got,
            }
            .into());
        }
        Ok(buf)
    }

    #[cfg(not(unix))]
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        file.read_exact(&mut buf).map_err(|_| {
            crate::error::DecodeError::Io(IoError::ShortRead {
                offset,
                requested: size,
                got: 0,
            })
        })?;
        Ok(buf)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// A [`PositionalReader`] backed by an in-memory buffer.
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    /// Wraps `data` as a positional reader.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl PositionalReader for MemoryReader {
    fn read_at(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(self.data[start..end].to_vec()),
            None => Err(IoError::ShortRead {
                offset,
                requested: size,
                got: self.data.len().saturating_sub(start),
            }
            .into()),
        }
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reader_reports_short_reads() {
        let r = MemoryReader::new(vec![1, 2, 3, 4]);
        assert!(r.read_at(0, 4).is_ok());
        assert!(r.read_at(2, 4).is_err());
        assert!(r.read_at(10, 1).is_err());
    }
}
