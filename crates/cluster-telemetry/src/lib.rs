//! Vehicle telemetry state for the instrument cluster.
//!
//! [`TelemetryStore`] is the single sink for decoded frames and synthetic
//! samples. Consumers read it through getters or [`TelemetryStore::snapshot`]
//! and learn about changes through observers or an event channel.
//!
//! ## Modules
//! - [`store`] - the shared store and its observer list
//! - [`events`] - change events and field identifiers
//! - [`state`] - snapshot type and temperature model
//! - [`distance`] - trip/odometer accumulation and the periodic integrator
//! - [`demo`] - synthetic waveform generator
//! - [`settings`] - persisted settings file

#![deny(static_mut_refs)]
#![deny(clippy::unwrap_used)]

pub mod demo;
pub mod distance;
pub mod events;
pub mod settings;
pub mod state;
pub mod store;
mod task;

pub use demo::{DemoDriver, DemoGenerator, Schedule, SyntheticSample, Waveform};
pub use distance::{DistanceAccumulator, DistanceIntegrator, IntegratorConfig};
pub use events::{Field, FieldChange, FieldValue, NavEvent, SubscriptionId, TelemetryEvent};
pub use settings::{
    JsonSettingsFile, LoadedSettings, MemorySettings, PersistedSettings, SettingsError,
    SettingsKey, SettingsResult, SettingsStore,
};
pub use state::{FuelDerivedTemperature, TelemetrySnapshot, TemperatureModel};
pub use store::{Observer, TelemetryStore};
pub use task::TaskHandle;

// Re-exported so consumers can name indicators without depending on the codec.
pub use cluster_frame::{FlagLayout, Indicator, IndicatorSet, LayoutKind};
