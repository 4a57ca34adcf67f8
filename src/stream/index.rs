// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sparse packet index mapping (source, sequence) to byte offsets.
//!
//! The index is built two ways: bulk-loaded from the persisted stats record
//! discovered through the footer at open time, and extended one entry per
//! frame as the reader scans forward. Entries are never removed, and an
//! existing entry is never overwritten: a disagreement between a recorded
//! offset and a freshly scanned one means the persisted index is stale and
//! is reported as a warning, not an error.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::core::{Result, StreamError};
use crate::stream::source::SourceId;

/// Byte-offset index over the frames of every source.
#[derive(Debug, Default)]
pub struct PacketIndex {
    positions: BTreeMap<SourceId, BTreeMap<usize, u64>>,
}

/// Wire shape of the persisted stats record.
#[derive(Debug, Deserialize)]
struct StatsRecord {
    #[serde(default)]
    src_packet_index: Vec<Vec<u64>>,
}

impl PacketIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an offset is recorded for (source, sequence).
    pub fn has(&self, source: SourceId, sequence: usize) -> bool {
        self.positions
            .get(&source)
            .is_some_and(|row| row.contains_key(&sequence))
    }

    /// Recorded byte offset of (source, sequence), if any.
    pub fn position(&self, source: SourceId, sequence: usize) -> Option<u64> {
        self.positions.get(&source)?.get(&sequence).copied()
    }

    /// Record the offset of a frame header.
    ///
    /// A pre-existing entry wins; a differing offset is logged and dropped.
    pub fn add(&mut self, source: SourceId, sequence: usize, offset: u64) {
        let row = self.positions.entry(source).or_default();
        match row.get(&sequence) {
            Some(&existing) if existing != offset => {
                warn!(
                    source,
                    sequence,
                    existing,
                    scanned = offset,
                    "packet index disagrees with scanned frame offset; index may be stale"
                );
            }
            Some(_) => {}
            None => {
                row.insert(sequence, offset);
            }
        }
    }

    /// Number of indexed frames for a source (0 if none).
    pub fn packet_count(&self, source: SourceId) -> usize {
        self.positions.get(&source).map_or(0, BTreeMap::len)
    }

    /// Number of frames of `source` that start before `offset`.
    ///
    /// Offsets grow with sequence number in an append-only stream, so this
    /// is a prefix count over the source's entries.
    pub fn count_before(&self, source: SourceId, offset: u64) -> usize {
        self.positions.get(&source).map_or(0, |row| {
            row.values().take_while(|&&pos| pos < offset).count()
        })
    }

    /// Merge the persisted stats record into the index.
    ///
    /// Returns the number of entries the record carried.
    pub fn merge_stats(&mut self, value: Value) -> Result<usize> {
        let record: StatsRecord = serde_json::from_value(value)
            .map_err(|e| StreamError::format("stats record", e.to_string()))?;
        let mut entries = 0;
        for (source, row) in record.src_packet_index.iter().enumerate() {
            for (sequence, &offset) in row.iter().enumerate() {
                self.add(source as SourceId, sequence, offset);
                entries += 1;
            }
        }
        Ok(entries)
    }
}
