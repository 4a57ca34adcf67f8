// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.
//!
//! [`StreamBuilder`] synthesizes packet-stream bytes at the wire level so
//! tests can exercise the reader without any capture hardware. It is test
//! tooling, not a writer API: records are emitted exactly as documented,
//! including deliberately malformed ones.

#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::{json, Value};

/// Byte-level builder for synthetic packet streams.
pub struct StreamBuilder {
    bytes: Vec<u8>,
    source_sizes: Vec<i64>,
    index: Vec<Vec<u64>>,
}

impl StreamBuilder {
    /// Start a stream: magic plus a header record with the given start time.
    pub fn new(start_time_us: i64) -> Self {
        let mut builder = Self {
            bytes: Vec::new(),
            source_sizes: Vec::new(),
            index: Vec::new(),
        };
        builder.bytes.extend_from_slice(b"PANGO");
        builder.push_tag(b"LIN");
        builder.push_json_line(&json!({ "time_us": start_time_us }));
        builder
    }

    /// Append a source descriptor record; returns the assigned id.
    ///
    /// `size_bytes` of 0 declares variable-size frames (length prefix per
    /// frame).
    pub fn add_source(&mut self, driver: &str, uri: &str, size_bytes: i64) -> u32 {
        let id = self.source_sizes.len() as u32;
        self.push_tag(b"SRC");
        self.push_json_line(&json!({
            "driver": driver,
            "id": id,
            "uri": uri,
            "info": {},
            "version": 1,
            "packet": {
                "alignment_bytes": 1,
                "definitions": "",
                "size_bytes": size_bytes
            }
        }));
        self.source_sizes.push(size_bytes);
        self.index.push(Vec::new());
        id
    }

    /// Append a source descriptor with an explicit (possibly wrong) id.
    pub fn add_source_with_id(&mut self, id: u32, driver: &str, uri: &str, size_bytes: i64) {
        self.push_tag(b"SRC");
        self.push_json_line(&json!({
            "driver": driver,
            "id": id,
            "uri": uri,
            "info": {},
            "version": 1,
            "packet": {
                "alignment_bytes": 1,
                "definitions": "",
                "size_bytes": size_bytes
            }
        }));
    }

    /// Append a frame record.
    pub fn frame(&mut self, source: u32, time_us: i64, payload: &[u8]) {
        self.frame_record(source, source, time_us, payload, None);
    }

    /// Append a frame record preceded by its metadata record.
    pub fn frame_with_meta(&mut self, source: u32, time_us: i64, payload: &[u8], meta: &Value) {
        self.frame_record(source, source, time_us, payload, Some(meta));
    }

    /// Append a metadata record naming one source followed by a frame of
    /// another. Readers must reject this.
    pub fn frame_with_mismatched_meta(
        &mut self,
        meta_source: u32,
        packet_source: u32,
        time_us: i64,
        payload: &[u8],
    ) {
        self.frame_record(
            meta_source,
            packet_source,
            time_us,
            payload,
            Some(&json!({ "note": "mismatched" })),
        );
    }

    fn frame_record(
        &mut self,
        meta_source: u32,
        packet_source: u32,
        time_us: i64,
        payload: &[u8],
        meta: Option<&Value>,
    ) {
        if let Some(row) = self.index.get_mut(packet_source as usize) {
            row.push(self.bytes.len() as u64);
        }
        if let Some(meta) = meta {
            self.push_tag(b"JSN");
            self.push_varint(u64::from(meta_source));
            self.push_json(meta);
        }
        self.push_tag(b"PKT");
        self.bytes.extend_from_slice(&time_us.to_le_bytes());
        self.push_varint(u64::from(packet_source));
        let fixed = self
            .source_sizes
            .get(packet_source as usize)
            .copied()
            .unwrap_or(0);
        if fixed == 0 {
            self.push_varint(payload.len() as u64);
        }
        self.bytes.extend_from_slice(payload);
    }

    /// Append one zero-payload keepalive record.
    pub fn keepalive(&mut self) {
        self.push_tag(b"SYN");
    }

    /// Append a mid-stream magic anchor.
    pub fn anchor(&mut self) {
        self.bytes.extend_from_slice(b"PANGO");
    }

    /// Append raw garbage bytes.
    pub fn garbage(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Append a mid-stream stats record snapshotting the index so far.
    pub fn stats_snapshot(&mut self) {
        self.push_tag(b"STA");
        let index = self.index.clone();
        self.push_json(&json!({ "src_packet_index": index }));
    }

    /// Current stream length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Finish without any terminator, like a capture truncated mid-write.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Finish with an explicit end marker but no persisted index.
    pub fn finish_with_end(mut self) -> Vec<u8> {
        self.push_tag(b"END");
        self.bytes
    }

    /// Finish with a persisted stats record and trailing footer.
    pub fn finish_with_index(mut self) -> Vec<u8> {
        let stats_pos = self.bytes.len() as u64;
        self.push_tag(b"STA");
        let index = self.index.clone();
        self.push_json(&json!({ "src_packet_index": index }));
        self.push_tag(b"FTR");
        self.bytes.extend_from_slice(&stats_pos.to_le_bytes());
        self.bytes
    }

    fn push_tag(&mut self, tag: &[u8; 3]) {
        self.bytes.extend_from_slice(tag);
    }

    fn push_json(&mut self, value: &Value) {
        let doc = serde_json::to_vec(value).expect("test json serializes");
        self.bytes.extend_from_slice(&doc);
    }

    fn push_json_line(&mut self, value: &Value) {
        self.push_json(value);
        self.bytes.push(b'\n');
    }

    fn push_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                self.bytes.push(byte | 0x80);
            } else {
                self.bytes.push(byte);
                break;
            }
        }
    }
}

/// Write stream bytes to a pid-suffixed temp file; caller removes it.
pub fn write_temp_stream(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("robolog_{name}_{}.log", std::process::id()));
    std::fs::write(&path, bytes).expect("write temp stream");
    path
}
