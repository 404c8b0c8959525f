//! Random-access, synchronously readable byte sources.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A file-like byte source: positioned reads, short reads permitted at EOF.
/// Implementations own their handle and close it on `Drop`, the same scoped
/// acquisition every caller of `parse_sync` relies on.
pub trait Source {
    /// Reads up to `max_count` bytes starting at `position`. Returns fewer bytes
    /// only at end of stream (including zero, which signals EOF to the driver).
    fn read_at(&mut self, position: u64, max_count: usize) -> io::Result<Vec<u8>>;
}

/// A `Source` backed by an open file.
#[derive(Debug)]
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self { file: File::open(path)? })
    }

    pub fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl Source for FileSource {
    fn read_at(&mut self, position: u64, max_count: usize) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(position))?;

        let mut buffer = vec![0_u8; max_count];
        let mut total_read = 0;

        while total_read < max_count {
            let n = self.file.read(&mut buffer[total_read..])?;
            if n == 0 { break; }
            total_read += n;
        }

        buffer.truncate(total_read);
        Ok(buffer)
    }
}

/// An in-memory `Source`, useful for tests and for pre-loaded buffers.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl Source for MemorySource {
    fn read_at(&mut self, position: u64, max_count: usize) -> io::Result<Vec<u8>> {
        let start = position as usize;
        if start >= self.data.len() {
            return Ok(Vec::new());
        }

        let end = (start + max_count).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }
}
