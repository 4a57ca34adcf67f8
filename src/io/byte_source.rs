// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte-source capability trait for packet-stream input.
//!
//! A packet stream can be replayed from a regular file, a memory map, an
//! in-memory buffer, or a pipe. Readers only require sequential byte
//! access; random access is an optional capability that unlocks footer
//! discovery, indexing, and seeking. Sources that cannot seek (FIFOs,
//! sockets) degrade those features gracefully instead of failing.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// A readable, optionally seekable supply of stream bytes.
///
/// The default implementation is non-seekable; seekable sources override
/// both methods.
pub trait ByteSource: Read + Send {
    /// Whether byte-exact seek and tell are available.
    fn is_seekable(&self) -> bool {
        false
    }

    /// Seek to a byte position, returning the new absolute offset.
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "byte source does not support seeking",
        ))
    }
}

impl ByteSource for BufReader<File> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }
}

impl ByteSource for io::Cursor<Vec<u8>> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }
}

/// Non-seekable wrapper for pipe-like readers.
///
/// Wraps any `Read` (a FIFO, a socket, a decompressor) as a byte source
/// with seeking disabled.
pub struct PipeSource<R> {
    inner: R,
}

impl<R: Read + Send> PipeSource<R> {
    /// Wrap a reader as a non-seekable byte source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> Read for PipeSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> ByteSource for PipeSource<R> {}

/// Memory-mapped byte source for seekable replay of large capture files.
pub struct MmapSource {
    cursor: io::Cursor<memmap2::Mmap>,
}

impl MmapSource {
    /// Map a file read-only and position at its start.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self {
            cursor: io::Cursor::new(mmap),
        })
    }

    /// Total mapped length in bytes.
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// Whether the mapped file is empty.
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().len() == 0
    }
}

impl Read for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl ByteSource for MmapSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut self.cursor, pos)
    }
}
