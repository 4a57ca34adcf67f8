// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for packet-stream input.
//!
//! This module provides the byte-source capability trait and the tag-aware
//! cursor the stream reader is built on.

pub mod byte_source;
pub mod cursor;

// Re-exports
pub use byte_source::{ByteSource, MmapSource, PipeSource};
pub use cursor::Cursor;
