//! Wires one producer, the store and the odometer integrator together.

use crate::config::{ClusterConfig, ProducerKind};
use crate::observer::log_event;
use anyhow::{Context, Result};
use cluster_link::{LinkCounterSnapshot, LinkHandle, LinkReader, LinkState, SerialConnector};
use cluster_telemetry::{
    DemoDriver, DemoGenerator, DistanceIntegrator, JsonSettingsFile, Schedule, SettingsStore,
    SubscriptionId, TaskHandle, TelemetryStore,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Main loop sleep when there is nothing to poll.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// How often link counters are logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

enum Producer {
    Link(LinkHandle),
    Demo(DemoDriver),
}

/// A running daemon.
pub struct Runtime {
    store: Arc<TelemetryStore>,
    producer: Producer,
    odometer: TaskHandle,
    subscription: SubscriptionId,
    poll_interval: Duration,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("store", &self.store)
            .field("link_state", &self.link_state())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Build the store from the settings file and start everything.
    pub fn start(config: &ClusterConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let settings: Arc<dyn SettingsStore> =
            Arc::new(JsonSettingsFile::new(config.settings_path.clone()));
        info!(path = %config.settings_path.display(), "Using settings file");
        let store = Arc::new(TelemetryStore::with_settings(
            config.protocol.flag_layout.layout(),
            settings,
        ));
        Self::start_with_store(config, store)
    }

    /// Start the producer and integrator against an existing store.
    pub fn start_with_store(config: &ClusterConfig, store: Arc<TelemetryStore>) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let subscription = store.subscribe(log_event);

        let producer = match config.producer {
            ProducerKind::Link => {
                let connector = SerialConnector::from_config(&config.link);
                let reader = LinkReader::new(connector, config.link.clone(), store.clone());
                Producer::Link(reader.spawn().context("failed to start link reader")?)
            }
            ProducerKind::DemoPull => Producer::Demo(
                DemoGenerator::new(store.clone())
                    .start(Schedule::Pull)
                    .context("failed to start demo generator")?,
            ),
            ProducerKind::DemoPush => Producer::Demo(
                DemoGenerator::new(store.clone())
                    .start(Schedule::Push {
                        interval: config.demo.interval(),
                    })
                    .context("failed to start demo generator")?,
            ),
        };

        let odometer = DistanceIntegrator::new(store.clone(), config.odometer.integrator())
            .spawn()
            .context("failed to start odometer integrator")?;

        info!(producer = ?config.producer, "Cluster runtime started");
        Ok(Self {
            store,
            producer,
            odometer,
            subscription,
            poll_interval: config.demo.interval(),
        })
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    pub fn link_state(&self) -> Option<LinkState> {
        match &self.producer {
            Producer::Link(handle) => Some(handle.state()),
            Producer::Demo(_) => None,
        }
    }

    pub fn link_counters(&self) -> Option<LinkCounterSnapshot> {
        match &self.producer {
            Producer::Link(handle) => Some(handle.counters().snapshot()),
            Producer::Demo(_) => None,
        }
    }

    /// Advance a pull-mode demo by one tick. Returns false for other producers.
    pub fn tick(&self) -> bool {
        match &self.producer {
            Producer::Demo(driver) => driver.generator().map(DemoGenerator::poll).is_some(),
            Producer::Link(_) => false,
        }
    }

    /// Block until `stop` is set, ticking a pull-mode demo and logging link
    /// health periodically.
    pub fn run_until(&self, stop: &AtomicBool) {
        let mut last_status = Instant::now();
        while !stop.load(Ordering::Acquire) {
            let pause = if self.tick() {
                self.poll_interval
            } else {
                IDLE_POLL
            };
            if last_status.elapsed() >= STATUS_INTERVAL {
                last_status = Instant::now();
                self.log_status();
            }
            thread::sleep(pause);
        }
    }

    fn log_status(&self) {
        if let Some(counters) = self.link_counters() {
            debug!(
                state = ?self.link_state(),
                bytes = counters.bytes_read,
                frames = counters.frames_decoded,
                rejected = counters.frames_rejected(),
                skipped = counters.skipped_bytes,
                "Link status"
            );
        }
    }

    /// Stop the producer, then the integrator.
    pub fn shutdown(self) -> Result<()> {
        let Self {
            store,
            producer,
            odometer,
            subscription,
            ..
        } = self;

        let result = match producer {
            Producer::Link(handle) => handle.stop().context("link reader failed"),
            Producer::Demo(driver) => {
                driver.stop();
                Ok(())
            }
        };
        odometer.stop();
        if !store.unsubscribe(subscription) {
            warn!("Logging observer was already removed");
        }
        info!(
            trip_km = store.trip_km(),
            odometer_km = store.odometer_km(),
            "Cluster runtime stopped"
        );
        result
    }
}
