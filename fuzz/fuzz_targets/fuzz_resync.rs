//! Fuzzes the stream resynchronizer with arbitrary chunked input.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_resync
#![no_main]
use cluster_frame::{FRAME_LEN, Resynchronizer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|chunks: Vec<Vec<u8>>| {
    let mut resync = Resynchronizer::new();
    for chunk in &chunks {
        resync.feed(chunk, |_| {});
        // Anything left over is at most one partial frame.
        assert!(resync.pending().len() < FRAME_LEN);
    }
});
