//! Positioned, read-only byte source over the `.DB` and `.MB` files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::error::{ParadoxError, Result};

/// A seekable reader with the two operations the decoder needs: read N bytes
/// at an absolute offset, and report the total size. Short reads fail.
#[derive(Debug)]
pub struct ByteSource {
    file: File,
    path: PathBuf,
    len: u64,
}

impl ByteSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ParadoxError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| ParadoxError::io(path, e))?
            .len();
        Ok(ByteSource {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Fills `buf` from the absolute byte offset `offset`.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| ParadoxError::io(&self.path, e))
    }

    /// Reads `len` bytes at `offset` into a fresh buffer.
    pub fn read_vec_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}
