// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared playback clock for time-synchronized replay.
//!
//! [`SyncTime`] is a lightweight logical clock independent of any one
//! reader. All frame waits driven by the same `SyncTime` are paced against
//! the same reference, so multiple readers (threads, or even cooperating
//! processes, provided each resyncs to the same logical offset) replay in
//! mutual time order. It is an open-loop pacing primitive, not a scheduler:
//! a wait either sleeps until the logical deadline or returns immediately.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    anchor: Instant,
    /// Logical stream offset, in microseconds, at the anchor instant.
    offset_us: i64,
}

/// Logical clock pacing playback to elapsed wall time.
#[derive(Debug)]
pub struct SyncTime {
    inner: Mutex<SyncPoint>,
}

impl SyncTime {
    /// Create a clock anchored at "now" with logical offset zero.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SyncPoint {
                anchor: Instant::now(),
                offset_us: 0,
            }),
        }
    }

    /// Reset the clock: logical offset zero is "now".
    pub fn start(&self) {
        *self.lock() = SyncPoint {
            anchor: Instant::now(),
            offset_us: 0,
        };
    }

    /// Current logical offset in microseconds.
    pub fn elapsed_offset_us(&self) -> i64 {
        let point = *self.lock();
        point.offset_us + point.anchor.elapsed().as_micros() as i64
    }

    /// Block the calling thread until the logical clock reaches
    /// `stream_offset_us`. Returns immediately if it already has.
    pub fn wait_until_offset(&self, stream_offset_us: i64) {
        let elapsed = self.elapsed_offset_us();
        if elapsed < stream_offset_us {
            thread::sleep(Duration::from_micros((stream_offset_us - elapsed) as u64));
        }
    }

    /// Re-anchor so the logical clock reads `stream_offset_us` right now.
    ///
    /// After a seek, resyncing to the target frame's offset makes a
    /// subsequent wait for that offset return immediately, keeping every
    /// reader paced from the new position.
    pub fn resync_to_offset(&self, stream_offset_us: i64) {
        *self.lock() = SyncPoint {
            anchor: Instant::now(),
            offset_us: stream_offset_us,
        };
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncPoint> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SyncTime {
    fn default() -> Self {
        Self::new()
    }
}
