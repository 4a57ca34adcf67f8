// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Packet-stream wire constants.
//!
//! This module contains the stream magic and all record tags of the
//! container format.
//!
//! A record tag is 3 ASCII bytes, packed little-endian into the low 24 bits
//! of a `u32` (first byte on the wire is the least significant). Using a
//! single source of truth for these constants prevents bugs from tag
//! mismatches between parsing stages.

/// Magic byte sequence at the start of every stream.
pub const STREAM_MAGIC: &[u8; 5] = b"PANGO";

/// Length of a record tag in bytes.
pub const TAG_LENGTH: usize = 3;

/// A packed record tag.
pub type RawTag = u32;

const fn pack_tag(a: u8, b: u8, c: u8) -> RawTag {
    (c as u32) << 16 | (b as u32) << 8 | a as u32
}

/// Stream header record - JSON with the stream start time, newline-terminated.
pub const TAG_HEADER: RawTag = pack_tag(b'L', b'I', b'N');
/// Mid-stream magic anchor - followed by the literal bytes `GO`.
pub const TAG_MAGIC: RawTag = pack_tag(b'P', b'A', b'N');
/// Zero-payload keepalive written in runs by live capture.
pub const TAG_SYNC: RawTag = pack_tag(b'S', b'Y', b'N');
/// Stats record - JSON holding the persisted packet index.
pub const TAG_STATS: RawTag = pack_tag(b'S', b'T', b'A');
/// Footer record - 8-byte little-endian offset of the stats record.
pub const TAG_FOOTER: RawTag = pack_tag(b'F', b'T', b'R');
/// Source descriptor record - JSON, newline-terminated.
pub const TAG_ADD_SOURCE: RawTag = pack_tag(b'S', b'R', b'C');
/// Per-frame metadata record - varint source id + JSON document.
pub const TAG_SOURCE_JSON: RawTag = pack_tag(b'J', b'S', b'N');
/// Frame record - timestamp, varint source id, optional varint length, payload.
pub const TAG_SOURCE_PACKET: RawTag = pack_tag(b'P', b'K', b'T');
/// Terminal marker.
pub const TAG_END: RawTag = pack_tag(b'E', b'N', b'D');

/// Render a tag's bytes for diagnostics.
///
/// Non-printable bytes are replaced so corrupt tags stay loggable.
pub fn tag_name(tag: RawTag) -> String {
    let bytes = [tag as u8, (tag >> 8) as u8, (tag >> 16) as u8];
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

/// The kind of the next record in a stream.
///
/// Closed set of record kinds with an explicit fallback arm: a tag outside
/// the known vocabulary is `Unknown` and triggers resynchronization, never a
/// fatal abort, so streams written by newer producers stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Stream header
    Header,
    /// Mid-stream magic anchor
    Magic,
    /// Keepalive
    Sync,
    /// Persisted index block
    Stats,
    /// Trailing index pointer
    Footer,
    /// New source descriptor
    AddSource,
    /// Per-frame metadata
    SourceJson,
    /// Frame payload header
    SourcePacket,
    /// End of stream
    End,
    /// Unrecognized tag
    Unknown(RawTag),
}

impl RecordKind {
    /// Classify a raw tag.
    pub fn from_tag(tag: RawTag) -> Self {
        match tag {
            TAG_HEADER => RecordKind::Header,
            TAG_MAGIC => RecordKind::Magic,
            TAG_SYNC => RecordKind::Sync,
            TAG_STATS => RecordKind::Stats,
            TAG_FOOTER => RecordKind::Footer,
            TAG_ADD_SOURCE => RecordKind::AddSource,
            TAG_SOURCE_JSON => RecordKind::SourceJson,
            TAG_SOURCE_PACKET => RecordKind::SourcePacket,
            TAG_END => RecordKind::End,
            other => RecordKind::Unknown(other),
        }
    }

    /// Whether a raw tag belongs to the known vocabulary.
    pub fn is_known(tag: RawTag) -> bool {
        !matches!(RecordKind::from_tag(tag), RecordKind::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_packing_matches_wire_order() {
        // First byte on the wire lands in the low bits.
        assert_eq!(TAG_SOURCE_PACKET & 0xff, u32::from(b'P'));
        assert_eq!((TAG_SOURCE_PACKET >> 8) & 0xff, u32::from(b'K'));
        assert_eq!((TAG_SOURCE_PACKET >> 16) & 0xff, u32::from(b'T'));
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name(TAG_HEADER), "LIN");
        assert_eq!(tag_name(TAG_SOURCE_PACKET), "PKT");
        assert_eq!(tag_name(TAG_END), "END");
    }

    #[test]
    fn test_tag_name_non_printable() {
        assert_eq!(tag_name(pack_tag(0x01, b'A', 0xff)), "?A?");
    }

    #[test]
    fn test_record_kind_round_trip() {
        let known = [
            (TAG_HEADER, RecordKind::Header),
            (TAG_MAGIC, RecordKind::Magic),
            (TAG_SYNC, RecordKind::Sync),
            (TAG_STATS, RecordKind::Stats),
            (TAG_FOOTER, RecordKind::Footer),
            (TAG_ADD_SOURCE, RecordKind::AddSource),
            (TAG_SOURCE_JSON, RecordKind::SourceJson),
            (TAG_SOURCE_PACKET, RecordKind::SourcePacket),
            (TAG_END, RecordKind::End),
        ];
        for (tag, kind) in known {
            assert_eq!(RecordKind::from_tag(tag), kind);
            assert!(RecordKind::is_known(tag));
        }
    }

    #[test]
    fn test_unknown_tag() {
        let tag = pack_tag(b'X', b'Y', b'Z');
        assert_eq!(RecordKind::from_tag(tag), RecordKind::Unknown(tag));
        assert!(!RecordKind::is_known(tag));
    }

    #[test]
    fn test_tags_are_distinct() {
        let all = [
            TAG_HEADER,
            TAG_MAGIC,
            TAG_SYNC,
            TAG_STATS,
            TAG_FOOTER,
            TAG_ADD_SOURCE,
            TAG_SOURCE_JSON,
            TAG_SOURCE_PACKET,
            TAG_END,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
