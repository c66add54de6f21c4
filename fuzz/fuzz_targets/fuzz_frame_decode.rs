//! Fuzzes the 14-byte frame decoder.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_frame_decode
#![no_main]
use cluster_frame::{FRAME_LEN, Frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Rejections are expected, panics are not.
    if let Ok(frame) = Frame::decode(data) {
        assert!(data.len() >= FRAME_LEN);
        assert_eq!(Frame::decode(&frame.encode()).ok(), Some(frame));
    }
});
