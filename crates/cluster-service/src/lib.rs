//! `clusterd`: runs the cluster telemetry pipeline as a daemon.
//!
//! ## Modules
//! - [`cli`] - command-line flags
//! - [`config`] - YAML configuration and validation
//! - [`observer`] - event logging
//! - [`runtime`] - producer, store and integrator lifecycle

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod cli;
pub mod config;
pub mod observer;
pub mod runtime;

pub use cli::{Cli, DemoMode};
pub use config::{
    ClusterConfig, ConfigError, ConfigResult, DemoConfig, OdometerConfig, ProducerKind,
    ProtocolConfig,
};
pub use runtime::Runtime;
