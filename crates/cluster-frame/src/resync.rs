//! Frame boundary recovery on an unreliable byte stream.
//!
//! The scan keeps no state besides the unconsumed tail of the buffer:
//!
//! 1. while at least [`FRAME_LEN`] bytes are buffered, look at the head;
//! 2. if the head is not the magic sentinel, drop exactly one byte;
//! 3. otherwise take the next `FRAME_LEN` bytes as a candidate and decode it;
//!    a candidate that fails validation is discarded whole and never rescanned;
//! 4. fewer than `FRAME_LEN` bytes are left buffered for the next read.
//!
//! Every byte is looked at a bounded number of times, so a feed is linear in
//! the buffer length, and alignment is regained at most `FRAME_LEN` bytes after
//! corruption stops.

use crate::frame::{FRAME_LEN, Frame, MAGIC_BYTES, decode};

/// Why a magic-aligned candidate was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Truncated,
    Magic,
    Version,
    Length,
    Checksum,
}

/// Tally of one or more resynchronization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResyncStats {
    /// Frames that decoded cleanly.
    pub frames: u64,
    /// Bytes dropped one at a time while hunting for the magic sentinel.
    pub skipped_bytes: u64,
    pub rejected_version: u64,
    pub rejected_length: u64,
    pub rejected_checksum: u64,
    /// Truncated or magic rejections; unreachable from the scan itself.
    pub rejected_other: u64,
}

impl ResyncStats {
    pub fn record_reject(&mut self, reason: RejectReason) {
        let slot = match reason {
            RejectReason::Version => &mut self.rejected_version,
            RejectReason::Length => &mut self.rejected_length,
            RejectReason::Checksum => &mut self.rejected_checksum,
            RejectReason::Truncated | RejectReason::Magic => &mut self.rejected_other,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_version
            .saturating_add(self.rejected_length)
            .saturating_add(self.rejected_checksum)
            .saturating_add(self.rejected_other)
    }

    pub fn merge(&mut self, other: &ResyncStats) {
        self.frames = self.frames.saturating_add(other.frames);
        self.skipped_bytes = self.skipped_bytes.saturating_add(other.skipped_bytes);
        self.rejected_version = self.rejected_version.saturating_add(other.rejected_version);
        self.rejected_length = self.rejected_length.saturating_add(other.rejected_length);
        self.rejected_checksum = self
            .rejected_checksum
            .saturating_add(other.rejected_checksum);
        self.rejected_other = self.rejected_other.saturating_add(other.rejected_other);
    }
}

/// Lazy iterator over the frames in a buffer.
///
/// Consumed bytes are removed from the front of the buffer when the iterator
/// is dropped, so stopping early keeps everything not yet scanned.
#[derive(Debug)]
pub struct Frames<'a> {
    buf: &'a mut Vec<u8>,
    pos: usize,
    stats: ResyncStats,
}

impl Frames<'_> {
    /// Bytes scanned so far (skipped, rejected or decoded).
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn stats(&self) -> &ResyncStats {
        &self.stats
    }
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            let rest = self.buf.get(self.pos..)?;
            let candidate = rest.first_chunk::<FRAME_LEN>()?;

            if !candidate.starts_with(&MAGIC_BYTES) {
                self.pos += 1;
                self.stats.skipped_bytes = self.stats.skipped_bytes.saturating_add(1);
                continue;
            }

            self.pos += FRAME_LEN;
            match decode(candidate) {
                Ok(frame) => {
                    self.stats.frames = self.stats.frames.saturating_add(1);
                    return Some(frame);
                }
                Err(err) => self.stats.record_reject(err.reason()),
            }
        }
    }
}

impl Drop for Frames<'_> {
    fn drop(&mut self) {
        let consumed = self.pos.min(self.buf.len());
        self.buf.drain(..consumed);
    }
}

/// Scan `buf` for frames, removing consumed bytes as the iterator advances.
pub fn drain_frames(buf: &mut Vec<u8>) -> Frames<'_> {
    Frames {
        buf,
        pos: 0,
        stats: ResyncStats::default(),
    }
}

/// Owns the accumulation buffer for one byte stream.
#[derive(Debug, Default)]
pub struct Resynchronizer {
    buf: Vec<u8>,
    stats: ResyncStats,
}

impl Resynchronizer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(FRAME_LEN * 8),
            stats: ResyncStats::default(),
        }
    }

    /// Append `chunk` and hand every decoded frame to `sink`, in stream order.
    ///
    /// Returns the number of frames decoded by this call.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F) -> usize
    where
        F: FnMut(Frame),
    {
        self.buf.extend_from_slice(chunk);
        let mut frames = drain_frames(&mut self.buf);
        let mut decoded = 0usize;
        for frame in frames.by_ref() {
            decoded += 1;
            sink(frame);
        }
        self.stats.merge(frames.stats());
        decoded
    }

    /// Bytes waiting for the rest of a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop buffered bytes, e.g. after the link was reopened.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn stats(&self) -> &ResyncStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;

    #[test]
    fn test_drops_leading_garbage() {
        let frame = Frame::new(1200, 800, 0x21);
        let mut buf = vec![0x00, 0x13, 0x5A, 0x37];
        buf.extend_from_slice(&encode(&frame));

        let frames: Vec<_> = drain_frames(&mut buf).collect();
        assert_eq!(frames, vec![frame]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_keeps_partial_tail() {
        let frame = encode(&Frame::new(1, 2, 3));
        let mut buf = frame[..9].to_vec();
        assert_eq!(drain_frames(&mut buf).count(), 0);
        assert_eq!(buf, frame[..9].to_vec());
    }

    #[test]
    fn test_bad_candidate_is_discarded_whole() {
        let good = Frame::new(3000, 1500, 1);
        let mut bad = encode(&good);
        bad[13] ^= 0xFF;

        let mut buf = bad.to_vec();
        buf.extend_from_slice(&encode(&good));

        let mut frames = drain_frames(&mut buf);
        assert_eq!(frames.next(), Some(good));
        assert_eq!(frames.next(), None);
        assert_eq!(frames.stats().rejected_checksum, 1);
        assert_eq!(frames.stats().skipped_bytes, 0);
        assert_eq!(frames.consumed(), 2 * FRAME_LEN);
    }

    #[test]
    fn test_early_drop_keeps_unscanned_bytes() {
        let a = Frame::new(1, 1, 0);
        let b = Frame::new(2, 2, 0);
        let mut buf = encode(&a).to_vec();
        buf.extend_from_slice(&encode(&b));

        {
            let mut frames = drain_frames(&mut buf);
            assert_eq!(frames.next(), Some(a));
        }
        assert_eq!(buf.len(), FRAME_LEN);

        assert_eq!(drain_frames(&mut buf).collect::<Vec<_>>(), vec![b]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_resynchronizer_split_reads() {
        let frame = Frame::new(4200, 2777, 0x0F);
        let bytes = encode(&frame);
        let mut resync = Resynchronizer::new();
        let mut seen = Vec::new();

        for chunk in bytes.chunks(3) {
            resync.feed(chunk, |f| seen.push(f));
        }

        assert_eq!(seen, vec![frame]);
        assert!(resync.pending().is_empty());
        assert_eq!(resync.stats().frames, 1);
    }

    #[test]
    fn test_stats_merge_and_total() {
        let mut a = ResyncStats::default();
        a.record_reject(RejectReason::Version);
        a.record_reject(RejectReason::Length);
        let mut b = ResyncStats {
            frames: 2,
            skipped_bytes: 5,
            ..ResyncStats::default()
        };
        b.record_reject(RejectReason::Checksum);
        a.merge(&b);
        assert_eq!(a.rejected(), 3);
        assert_eq!(a.frames, 2);
        assert_eq!(a.skipped_bytes, 5);
    }
}
