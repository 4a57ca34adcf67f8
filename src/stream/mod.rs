// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The packet-stream container format.
//!
//! This module holds everything specific to the container: the wire tag
//! vocabulary, source descriptors, the packet index, the reader
//! orchestrator, and the playback clock.

pub mod constants;
pub mod index;
pub mod reader;
pub mod source;
pub mod sync;

// Re-exports
pub use index::PacketIndex;
pub use reader::{Frame, FrameInfo, PacketReader};
pub use source::{PacketSource, SourceId, SourceRegistry};
pub use sync::SyncTime;
