// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tag-aware read cursor over a byte source.
//!
//! [`Cursor`] layers record-level operations on top of a [`ByteSource`]:
//! - tag lookahead (`peek_tag`) and consumption (`read_tag`, `expect_tag`)
//! - fixed-width and varint payload field readers
//! - incremental JSON document extraction
//! - a data-block countdown that bounds payload reads to the current frame
//! - byte-exact `tell`/`seek_to` when the source supports it
//! - `sync_to_tag` corruption recovery
//!
//! All derived state (`peeked`, `block_remaining`, the logical position) is
//! held in explicit fields and mutated only through the cursor's own
//! methods. The logical position is counted here rather than queried from
//! the source, so it stays exact over buffered readers and pipes alike.

use std::io::{self, Read, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Deserialize;

use crate::core::{Result, StreamError};
use crate::io::byte_source::ByteSource;
use crate::stream::constants::{tag_name, RawTag, RecordKind, TAG_END, TAG_LENGTH};

const SKIP_CHUNK: usize = 8192;

/// Byte-oriented read cursor with tag lookahead and block accounting.
pub struct Cursor {
    src: Box<dyn ByteSource>,
    /// Tag whose bytes have been consumed from the source but not yet
    /// surrendered to the caller.
    peeked: Option<RawTag>,
    /// How many source bytes the peeked tag accounts for (shorter than
    /// TAG_LENGTH only for a synthetic end-of-stream tag).
    peek_len: usize,
    /// Unread bytes left in the currently open data block.
    block_remaining: usize,
    /// Logical position: bytes consumed from the source since open.
    consumed: u64,
}

impl Cursor {
    /// Wrap a byte source, positioned at its current offset.
    pub fn new(src: Box<dyn ByteSource>) -> Self {
        Self {
            src,
            peeked: None,
            peek_len: 0,
            block_remaining: 0,
            consumed: 0,
        }
    }

    /// Whether the underlying source supports byte-exact seeking.
    pub fn is_seekable(&self) -> bool {
        self.src.is_seekable()
    }

    /// Read up to `buf.len()` bytes, short only at end of stream.
    ///
    /// Invalidates any peeked tag: its bytes were already consumed from the
    /// source, so the read continues after them.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.peeked = None;
        self.peek_len = 0;
        let mut total = 0;
        while total < buf.len() {
            match self.src.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.consumed += total as u64;
        self.block_remaining = self.block_remaining.saturating_sub(total);
        Ok(total)
    }

    /// Read exactly `buf.len()` bytes or fail.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.read(buf)?;
        if n < buf.len() {
            return Err(StreamError::io(format!(
                "unexpected end of stream: wanted {} bytes, got {n}",
                buf.len()
            )));
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    /// Skip `len` bytes, by seeking when possible.
    ///
    /// Returns the number of bytes actually skipped (short at end of
    /// stream on non-seekable sources).
    pub fn skip(&mut self, len: usize) -> Result<usize> {
        if len == 0 {
            return Ok(0);
        }
        if self.is_seekable() {
            self.peeked = None;
            self.peek_len = 0;
            self.src.seek(SeekFrom::Current(len as i64))?;
            self.consumed += len as u64;
            self.block_remaining = self.block_remaining.saturating_sub(len);
            Ok(len)
        } else {
            let mut scratch = [0u8; SKIP_CHUNK];
            let mut left = len;
            while left > 0 {
                let chunk = left.min(SKIP_CHUNK);
                let n = self.read(&mut scratch[..chunk])?;
                if n == 0 {
                    break;
                }
                left -= n;
            }
            Ok(len - left)
        }
    }

    /// Look at the next record tag without consuming it.
    ///
    /// A clean end of stream reads as [`TAG_END`].
    pub fn peek_tag(&mut self) -> Result<RawTag> {
        if let Some(tag) = self.peeked {
            return Ok(tag);
        }
        let mut bytes = [0u8; TAG_LENGTH];
        let n = self.read(&mut bytes)?;
        let tag = if n < TAG_LENGTH {
            TAG_END
        } else {
            pack_window(&bytes)
        };
        self.peeked = Some(tag);
        self.peek_len = n;
        Ok(tag)
    }

    /// Consume the next record tag.
    pub fn read_tag(&mut self) -> Result<RawTag> {
        let tag = self.peek_tag()?;
        self.peeked = None;
        self.peek_len = 0;
        Ok(tag)
    }

    /// Consume the next record tag, verifying it is the expected one.
    pub fn expect_tag(&mut self, expected: RawTag) -> Result<RawTag> {
        let tag = self.read_tag()?;
        if tag != expected {
            return Err(StreamError::tag_mismatch(tag_name(expected), tag_name(tag)));
        }
        Ok(tag)
    }

    /// Read a little-endian unsigned 64-bit field.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(ReadBytesExt::read_u64::<LittleEndian>(self)?)
    }

    /// Read a little-endian signed 64-bit field (timestamps).
    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(ReadBytesExt::read_i64::<LittleEndian>(self)?)
    }

    /// Read a variable-length unsigned integer.
    ///
    /// 7-bit little-endian groups; the high bit marks continuation.
    pub fn read_uint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.get_u8()?;
            if byte & 0x80 != 0 {
                value |= u64::from(byte & 0x7f) << shift;
                shift += 7;
                if shift > 63 {
                    return Err(StreamError::format(
                        "varint field",
                        "value exceeds 64 bits",
                    ));
                }
            } else {
                return Ok(value | u64::from(byte & 0x7f) << shift);
            }
        }
    }

    /// Read exactly one JSON document from the stream.
    ///
    /// Stops at the end of the document; any terminator byte that follows
    /// is left for the caller.
    pub fn read_json(&mut self) -> Result<serde_json::Value> {
        let mut de = serde_json::Deserializer::from_reader(&mut *self);
        serde_json::Value::deserialize(&mut de)
            .map_err(|e| StreamError::format("json record", e.to_string()))
    }

    /// Logical byte position of the next unconsumed record.
    ///
    /// Compensates for a peeked tag, so a `tell` taken while a tag is
    /// peeked addresses that tag's first byte.
    pub fn tell(&self) -> u64 {
        self.consumed - self.peek_len as u64
    }

    /// Jump to an absolute byte position. No-op on non-seekable sources.
    ///
    /// Discards any peeked tag and closes any open data block.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if !self.is_seekable() {
            return Ok(());
        }
        self.peeked = None;
        self.peek_len = 0;
        self.block_remaining = 0;
        self.src.seek(SeekFrom::Start(pos))?;
        self.consumed = pos;
        Ok(())
    }

    /// Jump to `back` bytes before the end of the source.
    ///
    /// Only valid on seekable sources; returns the resulting position.
    pub fn seek_from_end(&mut self, back: u64) -> Result<u64> {
        self.peeked = None;
        self.peek_len = 0;
        self.block_remaining = 0;
        let pos = self.src.seek(SeekFrom::End(-(back as i64)))?;
        self.consumed = pos;
        Ok(pos)
    }

    /// Scan forward byte-by-byte until a 3-byte window matches a known tag.
    ///
    /// Always advances at least one byte, so the tag under the cursor when
    /// recovery starts is never returned. Leaves the found tag peeked; end
    /// of stream reads as [`TAG_END`].
    pub fn sync_to_tag(&mut self) -> Result<RawTag> {
        let start = self.peek_tag()?;
        if start == TAG_END && self.peek_len < TAG_LENGTH {
            return Ok(TAG_END);
        }
        let mut window = [start as u8, (start >> 8) as u8, (start >> 16) as u8];
        self.peeked = None;
        self.peek_len = 0;
        loop {
            let mut byte = [0u8; 1];
            if self.read(&mut byte)? == 0 {
                self.peeked = Some(TAG_END);
                self.peek_len = 0;
                return Ok(TAG_END);
            }
            window[0] = window[1];
            window[1] = window[2];
            window[2] = byte[0];
            let tag = pack_window(&window);
            if RecordKind::is_known(tag) {
                self.peeked = Some(tag);
                self.peek_len = TAG_LENGTH;
                return Ok(tag);
            }
        }
    }

    /// Start a data block of `len` payload bytes at the current position.
    pub fn open_block(&mut self, len: usize) {
        self.block_remaining = len;
    }

    /// Unread bytes left in the open data block, zero when none is open.
    pub fn block_remaining(&self) -> usize {
        self.block_remaining
    }
}

impl Read for Cursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.peeked = None;
        self.peek_len = 0;
        let n = self.src.read(buf)?;
        self.consumed += n as u64;
        self.block_remaining = self.block_remaining.saturating_sub(n);
        Ok(n)
    }
}

fn pack_window(bytes: &[u8; TAG_LENGTH]) -> RawTag {
    u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16
}
