// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Source descriptors and the dense source registry.
//!
//! A source is one logical channel of frames (one camera, one sensor).
//! Sources announce themselves in-stream with a JSON descriptor record and
//! are identified by dense integer ids assigned in announcement order.

use serde::Deserialize;
use serde_json::Value;

use crate::core::{Result, StreamError};

/// Identifier of one source within a stream. Dense, assigned from 0.
pub type SourceId = u32;

/// Immutable descriptor of one frame source.
///
/// Created once when the source's descriptor record is first parsed, then
/// owned by the registry for the lifetime of the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketSource {
    /// Stream-assigned dense id
    pub id: SourceId,
    /// Producing driver name (e.g. a camera driver)
    pub driver: String,
    /// Producer-supplied resource identifier
    pub uri: String,
    /// Opaque producer metadata
    pub info: Value,
    /// Descriptor version
    pub version: i64,
    /// Payload alignment requested by the producer
    pub data_alignment_bytes: i64,
    /// Opaque payload schema string
    pub data_definitions: String,
    /// Fixed payload size; 0 means each frame carries a length prefix
    pub data_size_bytes: i64,
}

impl PacketSource {
    /// Fixed per-frame payload size, if this source declares one.
    pub fn fixed_size(&self) -> Option<usize> {
        if self.data_size_bytes > 0 {
            Some(self.data_size_bytes as usize)
        } else {
            None
        }
    }

    /// Parse a descriptor from its wire JSON document.
    pub fn from_json(value: Value) -> Result<Self> {
        let record: SourceRecord = serde_json::from_value(value)
            .map_err(|e| StreamError::format("source descriptor", e.to_string()))?;
        Ok(PacketSource {
            id: record.id,
            driver: record.driver,
            uri: record.uri,
            info: record.info,
            version: record.version,
            data_alignment_bytes: record.packet.alignment_bytes,
            data_definitions: record.packet.definitions,
            data_size_bytes: record.packet.size_bytes,
        })
    }
}

/// Wire shape of a source descriptor record.
#[derive(Debug, Deserialize)]
struct SourceRecord {
    driver: String,
    id: SourceId,
    uri: String,
    #[serde(default)]
    info: Value,
    #[serde(default = "default_version")]
    version: i64,
    packet: PacketFields,
}

/// Wire shape of the nested packet description.
#[derive(Debug, Deserialize)]
struct PacketFields {
    #[serde(default = "default_alignment")]
    alignment_bytes: i64,
    #[serde(default)]
    definitions: String,
    #[serde(default)]
    size_bytes: i64,
}

fn default_version() -> i64 {
    1
}

fn default_alignment() -> i64 {
    1
}

/// Dense id-indexed set of the sources seen in a stream.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<PacketSource>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly parsed source descriptor.
    ///
    /// Ids are assigned densely by the writer, so a descriptor whose id is
    /// not the current registry size indicates a corrupt stream.
    pub fn register(&mut self, source: PacketSource) -> Result<SourceId> {
        if source.id as usize != self.sources.len() {
            return Err(StreamError::format(
                "source descriptor",
                format!(
                    "source id {} out of sequence (expected {})",
                    source.id,
                    self.sources.len()
                ),
            ));
        }
        let id = source.id;
        self.sources.push(source);
        Ok(id)
    }

    /// Look up a source by id.
    pub fn get(&self, id: SourceId) -> Option<&PacketSource> {
        self.sources.get(id as usize)
    }

    /// Whether a source id is registered.
    pub fn contains(&self, id: SourceId) -> bool {
        (id as usize) < self.sources.len()
    }

    /// All registered sources, id-ordered.
    pub fn sources(&self) -> &[PacketSource] {
        &self.sources
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
