//! The shared telemetry store.

use crate::distance::DistanceAccumulator;
use crate::events::{Field, FieldChange, NavEvent, SubscriptionId, TelemetryEvent};
use crate::settings::{LoadedSettings, PersistedSettings, SettingsKey, SettingsStore};
use crate::state::{FuelDerivedTemperature, State, TelemetrySnapshot, TemperatureModel};
use cluster_frame::{FlagLayout, Frame, Indicator};
use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Callback invoked for every published event, on the mutating thread.
pub type Observer = Arc<dyn Fn(&TelemetryEvent) + Send + Sync>;

/// Thread-safe record of the vehicle's current state.
///
/// All frame-derived fields are written in one critical section, and
/// observers are called after the lock is released, in the order the changes
/// were made. Setters that do not change a value publish nothing.
///
/// Distance writes (integration, trip and odometer overwrites) are ordered by
/// a second lock that is held through persisting and publishing, so storage
/// and observers see them in the order they were applied.
pub struct TelemetryStore {
    state: Mutex<State>,
    layout: FlagLayout,
    temperature: Box<dyn TemperatureModel>,
    settings: Option<Arc<dyn SettingsStore>>,
    /// Reentrant so an observer may save a distance from its callback.
    distance_order: ReentrantMutex<()>,
    /// Set when the stored trip could not be restored; cleared by `save_trip`.
    hold_trip: AtomicBool,
    /// Set when the stored odometer could not be restored; cleared by
    /// `save_odometer`.
    hold_odometer: AtomicBool,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
    channels: Mutex<Vec<Sender<TelemetryEvent>>>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("layout", &self.layout.name())
            .field("persistent", &self.settings.is_some())
            .field("observers", &self.observers.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(FlagLayout::default())
    }
}

impl TelemetryStore {
    /// Store without persistence; distances start at zero.
    pub fn new(layout: FlagLayout) -> Self {
        Self {
            state: Mutex::new(State::default()),
            layout,
            temperature: Box::new(FuelDerivedTemperature),
            settings: None,
            distance_order: ReentrantMutex::new(()),
            hold_trip: AtomicBool::new(false),
            hold_odometer: AtomicBool::new(false),
            observers: RwLock::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Store backed by `settings`, resuming trip, odometer, suspension and
    /// exhaust from whatever was persisted.
    ///
    /// A missing source starts from zero. When the trip or odometer cannot be
    /// read (unreadable file, malformed value) it also starts from zero, but
    /// is not written back until it is explicitly saved, so the stored value
    /// survives for repair.
    pub fn with_settings(layout: FlagLayout, settings: Arc<dyn SettingsStore>) -> Self {
        let loaded = match settings.load() {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                info!("No persisted settings, starting from zero");
                LoadedSettings::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted settings, starting from zero");
                LoadedSettings {
                    settings: PersistedSettings::default(),
                    rejected: SettingsKey::ALL.to_vec(),
                }
            }
        };
        let persisted = loaded.settings;

        let mut store = Self::new(layout);
        if loaded.is_rejected(SettingsKey::Trip) {
            warn!("Stored trip unusable; trip is not persisted until it is saved");
            *store.hold_trip.get_mut() = true;
        }
        if loaded.is_rejected(SettingsKey::Odometer) {
            warn!("Stored odometer unusable; odometer is not persisted until it is saved");
            *store.hold_odometer.get_mut() = true;
        }
        {
            let state = store.state.get_mut();
            state.distance = DistanceAccumulator::restore(
                persisted.trip.unwrap_or_default(),
                persisted.odometer.unwrap_or_default(),
            );
            state.suspension = persisted.suspension.unwrap_or_default();
            state.exhaust = persisted.exhaust.unwrap_or_default();
            debug!(
                trip_km = state.distance.trip_km(),
                odometer_km = state.distance.odometer_km(),
                "Restored distances"
            );
        }
        store.settings = Some(settings);
        store
    }

    pub fn with_temperature_model(mut self, model: impl TemperatureModel + 'static) -> Self {
        self.temperature = Box::new(model);
        self
    }

    pub fn layout(&self) -> FlagLayout {
        self.layout
    }

    // -- observers -------------------------------------------------------

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TelemetryEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Receive events on another thread. The channel is dropped from the
    /// store once its receiver goes away.
    pub fn subscribe_channel(&self) -> Receiver<TelemetryEvent> {
        let (tx, rx) = unbounded();
        self.channels.lock().push(tx);
        rx
    }

    fn publish(&self, events: &[TelemetryEvent]) {
        if events.is_empty() {
            return;
        }
        let observers: Vec<Observer> = self
            .observers
            .read()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for event in events {
            // Channels first: an observer may publish from its callback, and
            // channel consumers must still see this event before that one.
            self.channels.lock().retain(|tx| {
                tx.send(*event).is_ok() || {
                    trace!("Dropping disconnected event channel");
                    false
                }
            });
            for observer in &observers {
                observer(event);
            }
        }
    }

    fn publish_changes(&self, changes: Vec<FieldChange>) {
        let events: Vec<TelemetryEvent> = changes.into_iter().map(TelemetryEvent::Changed).collect();
        self.publish(&events);
    }

    /// True while a trip or odometer that failed to load is withheld from
    /// storage.
    pub fn distance_persistence_held(&self) -> bool {
        self.hold_trip.load(Ordering::Acquire) || self.hold_odometer.load(Ordering::Acquire)
    }

    fn persist(&self, patch: &PersistedSettings) {
        let Some(settings) = &self.settings else {
            return;
        };
        if let Err(e) = settings.merge(patch) {
            warn!(error = %e, "Failed to persist settings; keeping in-memory value");
        }
    }

    // -- frame ingestion ------------------------------------------------

    /// Apply one telemetry sample.
    ///
    /// `flags` is split with the store's [`FlagLayout`]; only the indicators
    /// the layout carries are touched. Temperatures are re-derived from fuel.
    pub fn update_from_frame(&self, rpm: u16, speed_kmh: f64, flags: u16) {
        let decoded = self.layout.decode(flags);
        let fuel = f64::from(decoded.fuel_pct);
        let (water, oil) = self.temperature.temperatures(fuel);

        let (changes, first) = {
            let mut state = self.state.lock();
            let mut changes = Vec::with_capacity(8);
            changes.extend(state.set_rpm(u32::from(rpm)));
            changes.extend(state.set_scalar(Field::SpeedKmh, speed_kmh));
            for indicator in self.layout.bits() {
                changes.extend(state.set_indicator(*indicator, decoded.is_active(*indicator)));
            }
            changes.extend(state.set_scalar(Field::Fuel, fuel));
            changes.extend(state.set_scalar(Field::WaterTemp, water));
            changes.extend(state.set_scalar(Field::OilTemp, oil));
            let first = !state.first_frame_received;
            state.first_frame_received = true;
            (changes, first)
        };

        self.publish_changes(changes);
        if first {
            info!("First telemetry frame received");
            self.publish(&[TelemetryEvent::FirstFrame]);
        }
    }

    pub fn apply_frame(&self, frame: &Frame) {
        self.update_from_frame(frame.rpm, frame.speed_kmh(), frame.flags);
    }

    /// Synthetic generator entry point; see [`crate::demo::Waveform`].
    pub fn demo_tick(&self, elapsed_s: f64) {
        let sample = crate::demo::Waveform::default().sample(elapsed_s);
        self.update_from_frame(sample.rpm, sample.speed_kmh, sample.flags(self.layout));
    }

    // -- direct setters -------------------------------------------------

    pub fn set_rpm(&self, rpm: u32) {
        let change = self.state.lock().set_rpm(rpm);
        self.publish_changes(change.into_iter().collect());
    }

    /// Set any floating-point gauge; clamped per [`Field::range`].
    /// Non-scalar fields and NaN are ignored.
    pub fn set_scalar(&self, field: Field, value: f64) {
        let change = self.state.lock().set_scalar(field, value);
        self.publish_changes(change.into_iter().collect());
    }

    pub fn set_speed_kmh(&self, value: f64) {
        self.set_scalar(Field::SpeedKmh, value);
    }

    pub fn set_fuel(&self, value: f64) {
        self.set_scalar(Field::Fuel, value);
    }

    pub fn set_water_temp(&self, value: f64) {
        self.set_scalar(Field::WaterTemp, value);
    }

    pub fn set_oil_temp(&self, value: f64) {
        self.set_scalar(Field::OilTemp, value);
    }

    pub fn set_oil_pressure(&self, value: f64) {
        self.set_scalar(Field::OilPressure, value);
    }

    pub fn set_charging_voltage(&self, value: f64) {
        self.set_scalar(Field::ChargingVoltage, value);
    }

    pub fn set_air_fuel_ratio(&self, value: f64) {
        self.set_scalar(Field::AirFuelRatio, value);
    }

    pub fn set_indicator(&self, indicator: Indicator, on: bool) {
        let change = self.state.lock().set_indicator(indicator, on);
        self.publish_changes(change.into_iter().collect());
    }

    // -- getters --------------------------------------------------------

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.lock().snapshot()
    }

    pub fn rpm(&self) -> u32 {
        self.state.lock().rpm
    }

    pub fn speed_kmh(&self) -> f64 {
        self.state.lock().speed_kmh
    }

    /// Current value of a floating-point gauge.
    pub fn scalar(&self, field: Field) -> Option<f64> {
        self.state.lock().scalar(field)
    }

    pub fn fuel(&self) -> f64 {
        self.state.lock().fuel
    }

    pub fn water_temp(&self) -> f64 {
        self.state.lock().water_temp
    }

    pub fn oil_temp(&self) -> f64 {
        self.state.lock().oil_temp
    }

    pub fn oil_pressure(&self) -> f64 {
        self.state.lock().oil_pressure
    }

    pub fn charging_voltage(&self) -> f64 {
        self.state.lock().charging_voltage
    }

    pub fn air_fuel_ratio(&self) -> f64 {
        self.state.lock().air_fuel_ratio
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.state.lock().indicators.contains(indicator)
    }

    pub fn trip_km(&self) -> f64 {
        self.state.lock().distance.trip_km()
    }

    pub fn odometer_km(&self) -> f64 {
        self.state.lock().distance.odometer_km()
    }

    pub fn suspension(&self) -> [i32; 4] {
        self.state.lock().suspension
    }

    pub fn exhaust(&self) -> bool {
        self.state.lock().exhaust
    }

    pub fn first_frame_received(&self) -> bool {
        self.state.lock().first_frame_received
    }

    pub(crate) fn speed_sampled(&self) -> bool {
        self.state.lock().speed_sampled
    }

    // -- distance and persistence ----------------------------------------

    /// Add travelled distance; persists and publishes every crossed tenth.
    ///
    /// An event made stale by a trip or odometer overwrite issued from an
    /// observer callback is dropped rather than written over the new value.
    pub fn accumulate_distance(&self, km: f64) {
        let _order = self.distance_order.lock();
        let (events, trip_generation, odometer_generation) = {
            let mut state = self.state.lock();
            let events = state.distance.advance(km);
            (
                events,
                state.distance.trip_generation(),
                state.distance.odometer_generation(),
            )
        };

        for event in &events {
            let current = {
                let state = self.state.lock();
                match event {
                    TelemetryEvent::TripTenth { .. } => {
                        state.distance.trip_generation() == trip_generation
                    }
                    _ => state.distance.odometer_generation() == odometer_generation,
                }
            };
            if !current {
                trace!(?event, "Dropping distance event superseded by an overwrite");
                continue;
            }
            match *event {
                TelemetryEvent::TripTenth { tenths } if !self.hold_trip.load(Ordering::Acquire) => {
                    self.persist(&PersistedSettings::trip(tenths as f64 / 10.0));
                }
                TelemetryEvent::OdometerTenth { tenths }
                    if !self.hold_odometer.load(Ordering::Acquire) =>
                {
                    self.persist(&PersistedSettings::odometer(tenths as f64 / 10.0));
                }
                _ => {}
            }
            self.publish(std::slice::from_ref(event));
        }
    }

    pub fn save_suspension(&self, corners: [i32; 4]) {
        self.state.lock().suspension = corners;
        self.persist(&PersistedSettings {
            suspension: Some(corners),
            ..PersistedSettings::default()
        });
        self.publish(&[TelemetryEvent::Suspension { corners }]);
    }

    pub fn save_exhaust(&self, enabled: bool) {
        self.state.lock().exhaust = enabled;
        self.persist(&PersistedSettings {
            exhaust: Some(enabled),
            ..PersistedSettings::default()
        });
        self.publish(&[TelemetryEvent::Exhaust { enabled }]);
    }

    /// Overwrite the odometer and move its watermarks to the new value.
    pub fn save_odometer(&self, km: f64) {
        let _order = self.distance_order.lock();
        let (tenths, whole_km, stored) = {
            let mut state = self.state.lock();
            let (tenths, whole) = state.distance.set_odometer(km);
            (tenths, whole, state.distance.odometer_km())
        };
        if self.hold_odometer.swap(false, Ordering::AcqRel) {
            info!("Odometer persistence resumed");
        }
        self.persist(&PersistedSettings::odometer(stored));
        self.publish(&[
            TelemetryEvent::OdometerTenth { tenths },
            TelemetryEvent::OdometerKm { km: whole_km },
        ]);
    }

    /// Overwrite the trip; `0.0` resets it.
    pub fn save_trip(&self, km: f64) {
        let _order = self.distance_order.lock();
        let (tenths, stored) = {
            let mut state = self.state.lock();
            let tenths = state.distance.set_trip(km);
            (tenths, state.distance.trip_km())
        };
        if tenths == 0 {
            debug!("Trip reset");
        }
        if self.hold_trip.swap(false, Ordering::AcqRel) {
            info!("Trip persistence resumed");
        }
        self.persist(&PersistedSettings::trip(stored));
        self.publish(&[TelemetryEvent::TripTenth { tenths }]);
    }

    // -- navigation -----------------------------------------------------

    pub fn nav_up(&self) {
        self.publish(&[TelemetryEvent::Navigation { nav: NavEvent::Up }]);
    }

    pub fn nav_down(&self) {
        self.publish(&[TelemetryEvent::Navigation { nav: NavEvent::Down }]);
    }

    pub fn nav_select(&self) {
        self.publish(&[TelemetryEvent::Navigation {
            nav: NavEvent::Select,
        }]);
    }

    pub fn nav_back(&self) {
        self.publish(&[TelemetryEvent::Navigation { nav: NavEvent::Back }]);
    }
}
