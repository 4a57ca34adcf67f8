// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Packet-stream reader.
//!
//! [`PacketReader`] replays a multiplexed capture stream: it verifies the
//! magic, loads the persisted index through the trailing footer when the
//! source is seekable, then serves frames sequentially via
//! [`PacketReader::next_frame`] / [`PacketReader::next_frame_for`] and
//! randomly via [`PacketReader::seek`].
//!
//! A returned [`Frame`] is a checked-out view of the stream: it keeps the
//! reader's lock until the frame payload is drained, so exactly one
//! consumer is in flight over the shared cursor at a time. Dropping a
//! `Frame` drains whatever payload was left unread.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{Result, StreamError};
use crate::io::byte_source::{ByteSource, MmapSource, PipeSource};
use crate::io::cursor::Cursor;
use crate::stream::constants::{
    tag_name, RecordKind, STREAM_MAGIC, TAG_ADD_SOURCE, TAG_FOOTER, TAG_HEADER, TAG_LENGTH,
    TAG_SOURCE_JSON, TAG_SOURCE_PACKET, TAG_STATS,
};
use crate::stream::index::PacketIndex;
use crate::stream::source::{PacketSource, SourceId, SourceRegistry};
use crate::stream::sync::SyncTime;

/// Description of one frame, reconstructed from its header on every scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Source the frame belongs to
    pub source: SourceId,
    /// Capture timestamp, stream-clock microseconds
    pub time_us: i64,
    /// Payload size in bytes
    pub size: usize,
    /// Per-source sequence number, 0-based
    pub sequence: usize,
    /// Byte offset of the frame header; `None` on non-seekable sources
    pub offset: Option<u64>,
    /// Per-frame metadata, when the frame carried any
    pub meta: Option<Value>,
}

struct Inner {
    cursor: Cursor,
    registry: SourceRegistry,
    index: PacketIndex,
    next_sequence: HashMap<SourceId, usize>,
    start_time_us: i64,
}

/// Reader over a multiplexed packet stream.
pub struct PacketReader {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for PacketReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketReader").finish_non_exhaustive()
    }
}

impl PacketReader {
    /// Open a stream from a path.
    ///
    /// A FIFO opens in pipe mode: sequential reading works, but footer
    /// discovery, indexing, and seeking are disabled.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| StreamError::io(format!("failed to open {}: {e}", path.display())))?;
        if is_fifo(&file)? {
            Self::from_source(PipeSource::new(file))
        } else {
            Self::from_source(BufReader::new(file))
        }
    }

    /// Open a stream through a read-only memory map.
    pub fn open_mapped<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = MmapSource::open(path)
            .map_err(|e| StreamError::io(format!("failed to map {}: {e}", path.display())))?;
        Self::from_source(source)
    }

    /// Open a stream over an arbitrary byte source.
    pub fn from_source<S: ByteSource + 'static>(source: S) -> Result<Self> {
        let mut inner = Inner {
            cursor: Cursor::new(Box::new(source)),
            registry: SourceRegistry::new(),
            index: PacketIndex::new(),
            next_sequence: HashMap::new(),
            start_time_us: 0,
        };
        inner.init()?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Snapshot of all sources registered so far.
    ///
    /// Sources announced mid-stream appear once scanning has passed their
    /// descriptor record.
    pub fn sources(&self) -> Vec<PacketSource> {
        self.lock().registry.sources().to_vec()
    }

    /// Look up one source descriptor.
    pub fn source(&self, id: SourceId) -> Option<PacketSource> {
        self.lock().registry.get(id).cloned()
    }

    /// Number of sources registered so far.
    pub fn source_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Stream start time in microseconds (0 if the header carried none).
    pub fn start_time_us(&self) -> i64 {
        self.lock().start_time_us
    }

    /// Number of indexed frames for a source (0 if none indexed yet).
    pub fn packet_count(&self, source: SourceId) -> usize {
        self.lock().index.packet_count(source)
    }

    /// Sequence number the next scanned frame of `source` will receive.
    pub fn current_sequence(&self, source: SourceId) -> usize {
        self.lock().next_sequence.get(&source).copied().unwrap_or(0)
    }

    /// Whether random access is available.
    pub fn is_seekable(&self) -> bool {
        self.lock().cursor.is_seekable()
    }

    /// Advance to the next frame from any source.
    ///
    /// With a [`SyncTime`], blocks until the frame's logical time has
    /// arrived. Returns `Ok(None)` at end of stream.
    pub fn next_frame(&self, sync: Option<&SyncTime>) -> Result<Option<Frame<'_>>> {
        self.next_frame_impl(None, sync)
    }

    /// Advance to the next frame of one source, skipping the others.
    ///
    /// Skipped frames still pace the [`SyncTime`], so readers pulling
    /// different sources off the same file stay mutually time-ordered.
    /// Returns `Ok(None)` at end of stream.
    pub fn next_frame_for(
        &self,
        source: SourceId,
        sync: Option<&SyncTime>,
    ) -> Result<Option<Frame<'_>>> {
        self.next_frame_impl(Some(source), sync)
    }

    fn next_frame_impl(
        &self,
        wanted: Option<SourceId>,
        sync: Option<&SyncTime>,
    ) -> Result<Option<Frame<'_>>> {
        let mut inner = self.lock();
        loop {
            let info = match inner.scan_next()? {
                Some(info) => info,
                None => return Ok(None),
            };
            if let Some(sync) = sync {
                if inner.start_time_us != 0 {
                    sync.wait_until_offset(info.time_us - inner.start_time_us);
                }
            }
            match wanted {
                Some(want) if want != info.source => {
                    inner.drain_block()?;
                }
                _ => return Ok(Some(Frame { inner, info })),
            }
        }
    }

    /// Position the stream on frame `sequence` of `source`.
    ///
    /// Falls back to a linear scan (extending the index for every source
    /// passed) while the target is not indexed yet. On success the stream
    /// points at the frame header: the following
    /// [`next_frame_for`](Self::next_frame_for) call checks the frame out.
    /// With a [`SyncTime`], the clock is resynced to the target frame so
    /// playback resumes aligned from the new position.
    pub fn seek(
        &self,
        source: SourceId,
        sequence: usize,
        sync: Option<&SyncTime>,
    ) -> Result<FrameInfo> {
        let mut inner = self.lock();
        if !inner.cursor.is_seekable() {
            return Err(StreamError::usage(
                "cannot seek: byte source is not seekable (pipe input)",
            ));
        }
        if !inner.registry.contains(source) {
            return Err(StreamError::usage(format!(
                "cannot seek: source id {source} is not registered"
            )));
        }
        inner.drain_block()?;

        while !inner.index.has(source, sequence) {
            debug!(source, sequence, "seek target not indexed yet; scanning ahead");
            match inner.scan_next()? {
                Some(_) => {
                    inner.drain_block()?;
                }
                None => return Err(StreamError::out_of_range(source, sequence)),
            }
        }

        let target = inner
            .index
            .position(source, sequence)
            .ok_or_else(|| StreamError::out_of_range(source, sequence))?;

        inner.cursor.seek_to(target)?;
        inner.rewind_counters_to(target);

        // Parse the header once to learn the frame's timestamp, then step
        // back onto it so the next scan checks the frame out.
        let info = inner.scan_next()?.ok_or_else(|| {
            StreamError::format("seek", "indexed offset does not address a frame")
        })?;
        if info.source != source || info.sequence != sequence {
            warn!(
                source,
                sequence,
                found_source = info.source,
                found_sequence = info.sequence,
                "frame at indexed offset does not match the seek target; index may be stale"
            );
        }
        inner.cursor.seek_to(target)?;
        inner.rewind_counters_to(target);

        if let Some(sync) = sync {
            if inner.start_time_us != 0 {
                sync.resync_to_offset(info.time_us - inner.start_time_us);
            }
        }

        Ok(info)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn init(&mut self) -> Result<()> {
        for &expected in STREAM_MAGIC {
            let found = self
                .cursor
                .get_u8()
                .map_err(|_| StreamError::format("stream header", "unrecognised file magic"))?;
            if found != expected {
                return Err(StreamError::format(
                    "stream header",
                    "unrecognised file magic",
                ));
            }
        }
        self.setup_index()?;
        self.parse_header()?;
        while self.cursor.peek_tag()? == TAG_ADD_SOURCE {
            self.parse_add_source()?;
        }
        Ok(())
    }

    /// Load the persisted index through the trailing footer, if present.
    fn setup_index(&mut self) -> Result<()> {
        if !self.cursor.is_seekable() {
            return Ok(());
        }
        let resume = self.cursor.tell();
        let footer_size = (std::mem::size_of::<u64>() + TAG_LENGTH) as u64;
        if self.cursor.seek_from_end(footer_size).is_err() {
            // Stream shorter than a footer; nothing persisted.
            self.cursor.seek_to(resume)?;
            return Ok(());
        }
        if self.cursor.peek_tag()? == TAG_FOOTER {
            let stats_pos = self.parse_footer()?;
            self.cursor.seek_to(stats_pos)?;
            if self.cursor.peek_tag()? == TAG_STATS {
                self.parse_stats()?;
            }
        }
        self.cursor.seek_to(resume)?;
        Ok(())
    }

    fn parse_footer(&mut self) -> Result<u64> {
        self.cursor.expect_tag(TAG_FOOTER)?;
        self.cursor.read_u64_le()
    }

    fn parse_stats(&mut self) -> Result<()> {
        self.cursor.expect_tag(TAG_STATS)?;
        let value = self.cursor.read_json()?;
        let entries = self.index.merge_stats(value)?;
        debug!(entries, "loaded packet index from stats record");
        Ok(())
    }

    fn parse_header(&mut self) -> Result<()> {
        self.cursor.expect_tag(TAG_HEADER)?;
        let value = self.cursor.read_json()?;
        self.start_time_us = value.get("time_us").and_then(Value::as_i64).unwrap_or(0);
        if self.start_time_us == 0 {
            warn!("stream start time missing; time-synchronized playback is disabled");
        }
        self.cursor.get_u8()?; // record terminator
        Ok(())
    }

    fn parse_add_source(&mut self) -> Result<()> {
        self.cursor.expect_tag(TAG_ADD_SOURCE)?;
        let value = self.cursor.read_json()?;
        self.cursor.get_u8()?; // record terminator
        let source = PacketSource::from_json(value)?;
        let id = self.registry.register(source)?;
        self.next_sequence.entry(id).or_insert(0);
        Ok(())
    }

    /// Pull records until a frame header or end of stream.
    fn scan_next(&mut self) -> Result<Option<FrameInfo>> {
        loop {
            let tag = self.cursor.peek_tag()?;
            match RecordKind::from_tag(tag) {
                RecordKind::Sync => {
                    self.cursor.read_tag()?;
                }
                RecordKind::Magic => self.skip_anchor()?,
                RecordKind::AddSource => self.parse_add_source()?,
                RecordKind::SourceJson | RecordKind::SourcePacket => {
                    return Ok(Some(self.parse_packet_header()?));
                }
                RecordKind::Stats => self.parse_stats()?,
                RecordKind::Footer | RecordKind::End => return Ok(None),
                // A header should only appear at open, but a concatenated
                // stream replays it mid-scan.
                RecordKind::Header => self.parse_header()?,
                RecordKind::Unknown(found) => {
                    warn!(tag = %tag_name(found), "unexpected record tag; resynchronizing");
                    self.cursor.sync_to_tag()?;
                }
            }
        }
    }

    /// Consume a mid-stream magic anchor (`PAN` + literal `GO`).
    fn skip_anchor(&mut self) -> Result<()> {
        self.cursor.read_tag()?;
        let mut suffix = [0u8; 2];
        if self.cursor.read(&mut suffix)? < suffix.len() || &suffix != b"GO" {
            warn!("stray magic tag without anchor suffix; resynchronizing");
            self.cursor.sync_to_tag()?;
        }
        Ok(())
    }

    /// Parse a frame header (with optional preceding metadata record) and
    /// open its data block.
    fn parse_packet_header(&mut self) -> Result<FrameInfo> {
        let header_pos = self.cursor.tell();

        let mut meta = None;
        let mut meta_source = None;
        if self.cursor.peek_tag()? == TAG_SOURCE_JSON {
            self.cursor.read_tag()?;
            meta_source = Some(read_source_id(&mut self.cursor)?);
            meta = Some(self.cursor.read_json()?);
        }

        self.cursor.expect_tag(TAG_SOURCE_PACKET)?;
        let time_us = self.cursor.read_i64_le()?;
        let source = read_source_id(&mut self.cursor)?;
        if let Some(meta_id) = meta_source {
            if meta_id != source {
                return Err(StreamError::format(
                    "packet header",
                    format!(
                        "frame preceded by metadata for a mismatched source ({meta_id} vs {source})"
                    ),
                ));
            }
        }

        let descriptor = self.registry.get(source).ok_or_else(|| {
            StreamError::format(
                "packet header",
                format!("frame references unregistered source id {source}"),
            )
        })?;
        let size = match descriptor.fixed_size() {
            Some(fixed) => fixed,
            None => usize::try_from(self.cursor.read_uint()?).map_err(|_| {
                StreamError::format("packet header", "payload length exceeds addressable size")
            })?,
        };

        let counter = self.next_sequence.entry(source).or_insert(0);
        let sequence = *counter;
        *counter += 1;

        let offset = if self.cursor.is_seekable() {
            self.index.add(source, sequence, header_pos);
            Some(header_pos)
        } else {
            None
        };

        self.cursor.open_block(size);
        Ok(FrameInfo {
            source,
            time_us,
            size,
            sequence,
            offset,
            meta,
        })
    }

    fn drain_block(&mut self) -> Result<usize> {
        let remaining = self.cursor.block_remaining();
        if remaining > 0 {
            self.cursor.skip(remaining)?;
        }
        Ok(remaining)
    }

    /// Recompute every source's running sequence counter for a position.
    ///
    /// The scan fallback indexes all frames it passes, so by the time an
    /// offset is known the index covers every source up to it and the
    /// prefix counts are exact. Seeking one source therefore cannot
    /// desynchronize the others' numbering.
    fn rewind_counters_to(&mut self, offset: u64) {
        for source in self.registry.sources() {
            let sequence = self.index.count_before(source.id, offset);
            self.next_sequence.insert(source.id, sequence);
        }
    }
}

fn read_source_id(cursor: &mut Cursor) -> Result<SourceId> {
    SourceId::try_from(cursor.read_uint()?)
        .map_err(|_| StreamError::format("packet header", "source id out of range"))
}

#[cfg(unix)]
fn is_fifo(file: &File) -> Result<bool> {
    use std::os::unix::fs::FileTypeExt;
    let meta = file
        .metadata()
        .map_err(|e| StreamError::io(format!("failed to stat input: {e}")))?;
    Ok(meta.file_type().is_fifo())
}

#[cfg(not(unix))]
fn is_fifo(_file: &File) -> Result<bool> {
    Ok(false)
}

/// A checked-out frame.
///
/// Holds the reader's lock while the payload is consumed; dropping the
/// frame drains any unread payload and releases the lock, leaving the
/// stream positioned on the next record. All [`PacketReader`] methods
/// block until the frame is dropped.
pub struct Frame<'a> {
    inner: MutexGuard<'a, Inner>,
    info: FrameInfo,
}

impl Frame<'_> {
    /// Frame description.
    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    /// Source the frame belongs to.
    pub fn source(&self) -> SourceId {
        self.info.source
    }

    /// Capture timestamp in stream-clock microseconds.
    pub fn time_us(&self) -> i64 {
        self.info.time_us
    }

    /// Total payload size in bytes.
    pub fn size(&self) -> usize {
        self.info.size
    }

    /// Per-source sequence number.
    pub fn sequence(&self) -> usize {
        self.info.sequence
    }

    /// Per-frame metadata, when present.
    pub fn meta(&self) -> Option<&Value> {
        self.info.meta.as_ref()
    }

    /// Unread payload bytes.
    pub fn remaining(&self) -> usize {
        self.inner.cursor.block_remaining()
    }

    /// Read payload bytes into `buf`.
    ///
    /// Reads are bounded by the payload remainder; a request past it is
    /// clamped with a warning. Returns the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let len = buf.len().min(remaining);
        if len < buf.len() {
            warn!(
                requested = buf.len(),
                remaining, "payload read clamped to frame remainder"
            );
        }
        self.inner.cursor.read_exact(&mut buf[..len])?;
        Ok(len)
    }

    /// Read the whole remaining payload.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.remaining()];
        self.inner.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Skip payload bytes, clamped to the remainder.
    pub fn skip(&mut self, len: usize) -> Result<usize> {
        let remaining = self.remaining();
        let clamped = len.min(remaining);
        if clamped < len {
            warn!(
                requested = len,
                remaining, "payload skip clamped to frame remainder"
            );
        }
        if clamped > 0 {
            self.inner.cursor.skip(clamped)?;
        }
        Ok(clamped)
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let remaining = self.inner.cursor.block_remaining();
        if remaining > 0 {
            if let Err(e) = self.inner.cursor.skip(remaining) {
                warn!(remaining, error = %e, "failed to drain frame payload on release");
            }
        }
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("info", &self.info).finish()
    }
}
