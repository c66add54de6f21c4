//! Serial link reader for the instrument cluster.
//!
//! A dedicated thread opens the device, reads short-timeout chunks, recovers
//! frame boundaries and hands every valid frame to a [`FrameSink`]. Link loss
//! is never fatal: the reader drops back to [`LinkState::Disconnected`] and
//! retries after a delay until it is stopped.
//!
//! ## Modules
//! - [`config`] - device path, baud rate and timing
//! - [`connector`] - opening the byte stream
//! - [`counters`] - link health counters
//! - [`reader`] - the read/reconnect loop and its handle

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod connector;
pub mod counters;
pub mod reader;

pub use config::{DEVICE_ENV, LinkConfig};
pub use connector::{Connector, LinkStream, SerialConnector};
pub use counters::{LinkCounterSnapshot, LinkCounters};
pub use reader::{FrameSink, LinkHandle, LinkReader, LinkState};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to open {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from {device} failed: {source}")]
    Read {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Link reader thread exited abnormally")]
    Stopped,

    #[error("Invalid link configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn link reader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type LinkResult<T> = Result<T, LinkError>;
