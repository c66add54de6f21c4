//! Telemetry frame codec for the instrument cluster serial link.
//!
//! This crate is intentionally I/O-free: it turns bytes into [`Frame`]s and
//! back, and recovers frame boundaries from an unreliable byte stream. Opening
//! the link and feeding it live data belongs to `cluster-link`.
//!
//! ## Modules
//! - [`frame`] - fixed-size frame layout, `decode` and `encode`
//! - [`crc`] - CRC-16/X-25 checksum used by the frame trailer
//! - [`flags`] - indicator/fuel packing of the `flags` word
//! - [`resync`] - byte-stream resynchronization
//!
//! ## Wire layout (little-endian, 14 bytes)
//!
//! | Offset | Field    | Type |
//! |--------|----------|------|
//! | 0      | magic    | u16  |
//! | 2      | version  | u8   |
//! | 3      | length   | u8   |
//! | 4      | rpm      | u16  |
//! | 6      | vss_cm_s | u16  |
//! | 8      | flags    | u16  |
//! | 10     | aux      | u16  |
//! | 12     | checksum | u16  |

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod crc;
pub mod flags;
pub mod frame;
pub mod resync;

pub use flags::{DecodedFlags, FlagLayout, Indicator, IndicatorSet, LayoutKind};
pub use frame::{
    FRAME_LEN, FRAME_MAGIC, FRAME_VERSION, Frame, MAGIC_BYTES, decode, encode,
};
pub use resync::{Frames, RejectReason, ResyncStats, Resynchronizer, drain_frames};

use thiserror::Error;

/// Reasons a candidate frame fails validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Bad magic: expected {expected:#06x}, found {found:#06x}")]
    BadMagic { expected: u16, found: u16 },

    #[error("Unsupported frame version {found} (expected {expected})")]
    BadVersion { expected: u8, found: u8 },

    #[error("Bad length field: expected {expected}, found {found}")]
    BadLength { expected: u8, found: u8 },

    #[error("Checksum mismatch: frame carries {received:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { received: u16, computed: u16 },
}

impl FrameError {
    /// Classify the error for rejection counters.
    pub fn reason(&self) -> RejectReason {
        match self {
            FrameError::Truncated { .. } => RejectReason::Truncated,
            FrameError::BadMagic { .. } => RejectReason::Magic,
            FrameError::BadVersion { .. } => RejectReason::Version,
            FrameError::BadLength { .. } => RejectReason::Length,
            FrameError::ChecksumMismatch { .. } => RejectReason::Checksum,
        }
    }
}

pub type FrameResult<T> = Result<T, FrameError>;
