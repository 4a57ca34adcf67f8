// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tests for the shared playback clock and paced replay.
//!
//! Run with: cargo test --test sync_time_tests

mod common;

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use robolog::{PacketReader, SyncTime};

use common::StreamBuilder;

#[test]
fn test_two_waiters_pace_against_the_same_start() {
    let clock = Arc::new(SyncTime::new());
    clock.start();
    let begin = Instant::now();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let clock = clock.clone();
            thread::spawn(move || {
                clock.wait_until_offset(500_000);
                begin.elapsed()
            })
        })
        .collect();

    for handle in handles {
        let waited = handle.join().unwrap();
        assert!(
            waited >= Duration::from_millis(500),
            "waiter returned after {waited:?}"
        );
    }
}

#[test]
fn test_resync_makes_wait_immediate() {
    let clock = SyncTime::new();
    clock.resync_to_offset(500_000);

    let begin = Instant::now();
    clock.wait_until_offset(500_000);
    assert!(begin.elapsed() < Duration::from_millis(50));
}

#[test]
fn test_paced_replay_spaces_frames() {
    let mut builder = StreamBuilder::new(2_000_000);
    let cam = builder.add_source("camera", "cam:0", 0);
    builder.frame(cam, 2_000_000, b"at zero");
    builder.frame(cam, 2_040_000, b"at 40ms");
    builder.frame(cam, 2_080_000, b"at 80ms");
    let reader = PacketReader::from_source(io::Cursor::new(builder.finish_with_end())).unwrap();

    let clock = SyncTime::new();
    clock.start();
    let begin = Instant::now();
    let mut count = 0;
    while let Some(mut frame) = reader.next_frame(Some(&clock)).unwrap() {
        frame.read_to_vec().unwrap();
        count += 1;
    }
    assert_eq!(count, 3);
    assert!(
        begin.elapsed() >= Duration::from_millis(80),
        "replay finished after {:?}",
        begin.elapsed()
    );
}

#[test]
fn test_replay_without_header_time_is_unpaced() {
    // A stream whose header carried no start time cannot be paced; frames
    // are delivered as fast as they parse.
    let mut builder = StreamBuilder::new(0);
    let cam = builder.add_source("camera", "cam:0", 0);
    builder.frame(cam, 60_000_000, b"one minute in");
    let reader = PacketReader::from_source(io::Cursor::new(builder.finish_with_end())).unwrap();

    let clock = SyncTime::new();
    let begin = Instant::now();
    let mut frame = reader.next_frame(Some(&clock)).unwrap().unwrap();
    frame.read_to_vec().unwrap();
    drop(frame);
    assert!(begin.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_two_readers_share_one_clock() {
    // Two readers over the same bytes, each pulling its own source with
    // the shared clock, stay mutually time-ordered: the late frame cannot
    // be delivered before its offset has elapsed on either reader.
    let mut builder = StreamBuilder::new(1_000_000);
    let a = builder.add_source("camera", "cam:0", 0);
    let b = builder.add_source("lidar", "lidar:0", 0);
    builder.frame(a, 1_000_000, b"early");
    builder.frame(b, 1_060_000, b"late");
    let bytes = builder.finish_with_end();

    let clock = Arc::new(SyncTime::new());
    clock.start();
    let begin = Instant::now();

    let mut handles = Vec::new();
    for (source, bytes) in [(a, bytes.clone()), (b, bytes)] {
        let clock = clock.clone();
        handles.push(thread::spawn(move || {
            let reader = PacketReader::from_source(io::Cursor::new(bytes)).unwrap();
            let mut frame = reader
                .next_frame_for(source, Some(&clock))
                .unwrap()
                .expect("frame");
            frame.read_to_vec().unwrap();
            (source, begin.elapsed())
        }));
    }

    for handle in handles {
        let (source, waited) = handle.join().unwrap();
        if source == b {
            assert!(
                waited >= Duration::from_millis(60),
                "late frame delivered after {waited:?}"
            );
        }
    }
}

#[test]
fn test_start_discards_accumulated_offset() {
    let clock = SyncTime::new();
    clock.resync_to_offset(10_000_000);
    clock.start();
    assert!(clock.elapsed_offset_us() < 1_000_000);
}
