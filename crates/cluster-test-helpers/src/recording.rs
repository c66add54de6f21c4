//! Observer that records every telemetry event.

use cluster_telemetry::{Field, SubscriptionId, TelemetryEvent, TelemetryStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records events published by a [`TelemetryStore`].
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new recorder to `store`.
    pub fn attach(store: &TelemetryStore) -> (Self, SubscriptionId) {
        let recorder = Self::new();
        let sink = recorder.events.clone();
        let id = store.subscribe(move |event| sink.lock().push(*event));
        (recorder, id)
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Number of `Changed` events for `field`.
    pub fn changes_of(&self, field: Field) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::Changed(c) if c.field == field))
            .count()
    }

    pub fn count(&self, predicate: impl Fn(&TelemetryEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Trip tenths in publication order.
    pub fn trip_tenths(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TelemetryEvent::TripTenth { tenths } => Some(*tenths),
                _ => None,
            })
            .collect()
    }

    /// Odometer tenths in publication order.
    pub fn odometer_tenths(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TelemetryEvent::OdometerTenth { tenths } => Some(*tenths),
                _ => None,
            })
            .collect()
    }
}
