//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use cluster_test_helpers::prelude::*;
//! ```

pub use crate::fixtures::{corrupt_checksum, garbage, magic_free_garbage, valid_frame_bytes};
pub use crate::must::{must, must_some, must_with};
pub use crate::recording::RecordingObserver;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
