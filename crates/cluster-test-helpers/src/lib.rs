//! Shared test utilities for the instrument cluster crates.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`fixtures`] - Frame and byte-stream builders
//! - [`recording`] - Observer that records published telemetry events
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! cluster-test-helpers = { workspace = true }
//! ```
//!
//! ```rust,ignore
//! use cluster_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod fixtures;
pub mod must;
pub mod prelude;
pub mod recording;

pub use must::*;
