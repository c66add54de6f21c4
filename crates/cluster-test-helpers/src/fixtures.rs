//! Frame and byte-stream builders.

use cluster_frame::{FRAME_LEN, Frame, MAGIC_BYTES, encode};

/// Wire bytes of a valid frame.
pub fn valid_frame_bytes(rpm: u16, vss_cm_s: u16, flags: u16) -> [u8; FRAME_LEN] {
    encode(&Frame::new(rpm, vss_cm_s, flags))
}

/// A valid frame with its checksum trailer inverted.
pub fn corrupt_checksum(frame: &Frame) -> [u8; FRAME_LEN] {
    let mut bytes = encode(frame);
    if let Some(last) = bytes.last_mut() {
        *last ^= 0xFF;
    }
    bytes
}

/// Deterministic pseudo-random bytes.
pub fn garbage(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 56) as u8
        })
        .collect()
}

/// Like [`garbage`], with every magic sentinel broken up so the bytes can
/// never be mistaken for a frame start.
pub fn magic_free_garbage(len: usize, seed: u64) -> Vec<u8> {
    let mut bytes = garbage(len, seed);
    strip_magic(&mut bytes);
    bytes
}

/// Rewrite any `5A A5` pair in place.
pub fn strip_magic(bytes: &mut [u8]) {
    let [lo, hi] = MAGIC_BYTES;
    for i in 1..bytes.len() {
        if bytes.get(i - 1) == Some(&lo) && bytes.get(i) == Some(&hi) {
            if let Some(b) = bytes.get_mut(i) {
                *b = 0x00;
            }
        }
    }
}
