//! Bounded, seekable byte access to a single file.
//!
//! [`BinaryReader`] wraps any `Read + Seek` source and checks every read
//! and seek against the length captured when it was opened, so a short
//! file surfaces as [`ClassifierError::Truncated`] or
//! [`ClassifierError::OutOfRange`] instead of a bare `UnexpectedEof`.
//! The handle is owned by the reader and released when it is dropped.

use crate::error::{ClassifierError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Little-endian reader over a length-checked source.
#[derive(Debug)]
pub struct BinaryReader<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl BinaryReader<BufReader<File>> {
    /// Open a file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::NotFound`] or [`ClassifierError::AccessDenied`]
    /// for the two common open failures and [`ClassifierError::Io`] otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            len,
            pos: 0,
        })
    }
}

fn open_error(path: &Path, err: io::Error) -> ClassifierError {
    match err.kind() {
        io::ErrorKind::NotFound => ClassifierError::NotFound {
            path: path.display().to_string(),
        },
        io::ErrorKind::PermissionDenied => ClassifierError::AccessDenied {
            path: path.display().to_string(),
        },
        _ => ClassifierError::Io(err),
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wrap an already open source, positioned at offset 0.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len, pos: 0 })
    }

    /// Total length of the underlying source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Move to an absolute offset. Seeking exactly to the end is allowed.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(ClassifierError::OutOfRange {
                offset,
                len: self.len,
            });
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Advance the position by `count` bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let target = self
            .pos
            .checked_add(count)
            .ok_or(ClassifierError::OutOfRange {
                offset: u64::MAX,
                len: self.len,
            })?;
        self.seek(target)
    }

    fn ensure(&self, expected: usize) -> Result<()> {
        let available = self.len.saturating_sub(self.pos);
        if expected as u64 > available {
            return Err(ClassifierError::Truncated {
                offset: self.pos,
                expected,
                available,
            });
        }
        Ok(())
    }

    /// Read exactly `count` bytes.
    pub fn read_exact(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure(count)?;
        let mut buf = vec![0u8; count];
        self.inner.read_exact(&mut buf)?;
        self.pos += count as u64;
        Ok(buf)
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let value = self.inner.read_u16::<LittleEndian>()?;
        self.pos += 2;
        Ok(value)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let value = self.inner.read_u32::<LittleEndian>()?;
        self.pos += 4;
        Ok(value)
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let value = self.inner.read_i32::<LittleEndian>()?;
        self.pos += 4;
        Ok(value)
    }
}
