// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Robolog
//!
//! Reader for multiplexed packet-stream capture logs.
//!
//! A packet stream is a single append-oriented file holding timestamped
//! binary frames from multiple independent sources (cameras, sensors),
//! interleaved in arrival order. The container is self-describing: sources
//! announce themselves in-stream, a persisted index is discoverable through
//! a trailing footer, and tagged records let a reader resynchronize past
//! corruption or records written by newer producers.
//!
//! ## Architecture
//!
//! - `core/` - Error types
//! - `io/` - Byte-source capability trait and the tag-aware cursor
//! - `stream/` - The container format: tags, sources, index, reader, clock
//!
//! ## Example: Sequential reading
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robolog::PacketReader;
//!
//! let reader = PacketReader::open("capture.log")?;
//! while let Some(mut frame) = reader.next_frame(None)? {
//!     let payload = frame.read_to_vec()?;
//!     println!(
//!         "source {} frame {}: {} bytes",
//!         frame.source(),
//!         frame.sequence(),
//!         payload.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Paced replay of one source
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use robolog::{PacketReader, SyncTime};
//!
//! let reader = PacketReader::open("capture.log")?;
//! let clock = SyncTime::new();
//! while let Some(mut frame) = reader.next_frame_for(0, Some(&clock))? {
//!     // frames arrive paced to their capture spacing
//!     let _payload = frame.read_to_vec()?;
//! }
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{Result, StreamError};

// Byte sources and the tag-aware cursor
pub mod io;

pub use io::{ByteSource, Cursor, MmapSource, PipeSource};

// The container format
pub mod stream;

pub use stream::{Frame, FrameInfo, PacketIndex, PacketReader, PacketSource, SourceId, SyncTime};
