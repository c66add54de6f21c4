//! Link health counters.
//!
//! Written by the reader thread, read from anywhere. All counters use
//! `Ordering::Relaxed`; values are eventually consistent and individual
//! counters are not synchronized with each other.

use cluster_frame::ResyncStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`LinkCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkCounterSnapshot {
    /// Bytes received from the device.
    pub bytes_read: u64,
    /// Frames that passed validation.
    pub frames_decoded: u64,
    pub rejected_version: u64,
    pub rejected_length: u64,
    pub rejected_checksum: u64,
    /// Bytes dropped while hunting for a frame start.
    pub skipped_bytes: u64,
    /// Open attempts, successful or not.
    pub connect_attempts: u64,
    pub open_failures: u64,
    pub read_errors: u64,
}

impl LinkCounterSnapshot {
    pub fn frames_rejected(&self) -> u64 {
        self.rejected_version
            .saturating_add(self.rejected_length)
            .saturating_add(self.rejected_checksum)
    }
}

#[derive(Debug, Default)]
pub struct LinkCounters {
    bytes_read: AtomicU64,
    frames_decoded: AtomicU64,
    rejected_version: AtomicU64,
    rejected_length: AtomicU64,
    rejected_checksum: AtomicU64,
    skipped_bytes: AtomicU64,
    connect_attempts: AtomicU64,
    open_failures: AtomicU64,
    read_errors: AtomicU64,
}

impl LinkCounters {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            rejected_version: AtomicU64::new(0),
            rejected_length: AtomicU64::new(0),
            rejected_checksum: AtomicU64::new(0),
            skipped_bytes: AtomicU64::new(0),
            connect_attempts: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn add_bytes(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the resynchronizer's running totals.
    ///
    /// The stats are cumulative for the reader's lifetime, so they replace
    /// rather than add to the frame counters.
    pub fn publish_resync(&self, stats: &ResyncStats) {
        self.frames_decoded.store(stats.frames, Ordering::Relaxed);
        self.rejected_version
            .store(stats.rejected_version, Ordering::Relaxed);
        self.rejected_length
            .store(stats.rejected_length, Ordering::Relaxed);
        self.rejected_checksum
            .store(stats.rejected_checksum, Ordering::Relaxed);
        self.skipped_bytes
            .store(stats.skipped_bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkCounterSnapshot {
        LinkCounterSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            rejected_version: self.rejected_version.load(Ordering::Relaxed),
            rejected_length: self.rejected_length.load(Ordering::Relaxed),
            rejected_checksum: self.rejected_checksum.load(Ordering::Relaxed),
            skipped_bytes: self.skipped_bytes.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_frame::RejectReason;

    #[test]
    fn test_increments_and_snapshot() {
        let counters = LinkCounters::new();
        counters.add_bytes(64);
        counters.add_bytes(14);
        counters.inc_connect_attempt();
        counters.inc_open_failure();
        counters.inc_read_error();

        let snap = counters.snapshot();
        assert_eq!(snap.bytes_read, 78);
        assert_eq!(snap.connect_attempts, 1);
        assert_eq!(snap.open_failures, 1);
        assert_eq!(snap.read_errors, 1);
    }

    #[test]
    fn test_publish_resync_replaces_totals() {
        let counters = LinkCounters::new();
        let mut stats = ResyncStats {
            frames: 3,
            skipped_bytes: 5,
            ..ResyncStats::default()
        };
        stats.record_reject(RejectReason::Checksum);
        counters.publish_resync(&stats);
        counters.publish_resync(&stats);

        let snap = counters.snapshot();
        assert_eq!(snap.frames_decoded, 3);
        assert_eq!(snap.skipped_bytes, 5);
        assert_eq!(snap.frames_rejected(), 1);
    }
}
