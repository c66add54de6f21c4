//! Trip and odometer integration.
//!
//! [`DistanceAccumulator`] holds the precise distances and their watermarks and
//! lives inside the store's state. [`DistanceIntegrator`] samples the store's
//! speed on a fixed period and feeds the travelled distance back in.

use crate::events::TelemetryEvent;
use crate::store::TelemetryStore;
use crate::task::TaskHandle;
use crossbeam::channel::tick;
use crossbeam::select;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Tolerance applied before flooring so that e.g. 0.1 + 0.2 lands on the
/// third tenth.
const TENTH_EPSILON: f64 = 1e-9;

fn whole_tenths(km: f64) -> u64 {
    if km.is_finite() && km > 0.0 {
        (km * 10.0 + TENTH_EPSILON).floor() as u64
    } else {
        0
    }
}

fn sanitize(km: f64) -> f64 {
    if km.is_finite() && km > 0.0 { km } else { 0.0 }
}

/// Precise trip and odometer distances with their emission watermarks.
#[derive(Debug, Clone, Default)]
pub struct DistanceAccumulator {
    trip_km: f64,
    odometer_km: f64,
    /// Highest trip tenth already persisted and notified.
    trip_tenths: u64,
    /// Highest odometer tenth already persisted and notified.
    odometer_tenths: u64,
    /// Highest whole odometer km already notified.
    odometer_whole_km: u64,
    /// Bumped by every explicit trip overwrite.
    trip_generation: u64,
    /// Bumped by every explicit odometer overwrite.
    odometer_generation: u64,
}

impl DistanceAccumulator {
    /// Resume from persisted values; watermarks start at the restored marks so
    /// nothing is re-emitted.
    pub fn restore(trip_km: f64, odometer_km: f64) -> Self {
        let mut acc = Self::default();
        acc.set_trip(trip_km);
        acc.set_odometer(odometer_km);
        acc
    }

    pub fn trip_km(&self) -> f64 {
        self.trip_km
    }

    pub fn odometer_km(&self) -> f64 {
        self.odometer_km
    }

    pub fn trip_tenths(&self) -> u64 {
        self.trip_tenths
    }

    pub fn odometer_tenths(&self) -> u64 {
        self.odometer_tenths
    }

    /// Changes whenever the trip is overwritten; events produced under an
    /// older generation are stale.
    pub fn trip_generation(&self) -> u64 {
        self.trip_generation
    }

    /// Changes whenever the odometer is overwritten.
    pub fn odometer_generation(&self) -> u64 {
        self.odometer_generation
    }

    /// Overwrite the trip; zero (or anything non-positive) resets it.
    /// Returns the new trip watermark.
    pub fn set_trip(&mut self, km: f64) -> u64 {
        self.trip_km = sanitize(km);
        self.trip_tenths = whole_tenths(self.trip_km);
        self.trip_generation = self.trip_generation.wrapping_add(1);
        self.trip_tenths
    }

    /// Overwrite the odometer. Returns the new `(tenths, whole_km)` marks.
    pub fn set_odometer(&mut self, km: f64) -> (u64, u64) {
        self.odometer_km = sanitize(km);
        self.odometer_tenths = whole_tenths(self.odometer_km);
        self.odometer_whole_km = self.odometer_tenths / 10;
        self.odometer_generation = self.odometer_generation.wrapping_add(1);
        (self.odometer_tenths, self.odometer_whole_km)
    }

    /// Add `km` to both counters and return every crossed boundary.
    ///
    /// Trip tenths come first, then odometer tenths; a whole-km event directly
    /// follows the odometer tenth that completes it. Each sequence is strictly
    /// increasing by one, however large the step.
    pub fn advance(&mut self, km: f64) -> Vec<TelemetryEvent> {
        let km = sanitize(km);
        if km <= 0.0 {
            return Vec::new();
        }
        self.trip_km += km;
        self.odometer_km += km;

        let mut events = Vec::new();
        let trip_target = whole_tenths(self.trip_km);
        while self.trip_tenths < trip_target {
            self.trip_tenths += 1;
            events.push(TelemetryEvent::TripTenth {
                tenths: self.trip_tenths,
            });
        }

        let odo_target = whole_tenths(self.odometer_km);
        while self.odometer_tenths < odo_target {
            self.odometer_tenths += 1;
            events.push(TelemetryEvent::OdometerTenth {
                tenths: self.odometer_tenths,
            });
            let whole = self.odometer_tenths / 10;
            if whole > self.odometer_whole_km {
                self.odometer_whole_km = whole;
                events.push(TelemetryEvent::OdometerKm { km: whole });
            }
        }
        events
    }
}

/// Tuning of the periodic integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegratorConfig {
    pub period: Duration,
    /// Gaps longer than this (suspend, stalls) are not trusted.
    pub max_gap: Duration,
    /// Elapsed time assumed in place of an untrusted gap.
    pub fallback_gap: Duration,
    pub enabled: bool,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(500),
            max_gap: Duration::from_secs(5),
            fallback_gap: Duration::from_secs(1),
            enabled: true,
        }
    }
}

/// Integrates the store's speed over wall time into trip and odometer.
pub struct DistanceIntegrator {
    store: Arc<TelemetryStore>,
    config: IntegratorConfig,
    last_tick: Option<Instant>,
}

impl DistanceIntegrator {
    pub fn new(store: Arc<TelemetryStore>, config: IntegratorConfig) -> Self {
        Self {
            store,
            config,
            last_tick: None,
        }
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Run one integration step at `now`; returns the km added.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        let previous = self.last_tick.replace(now);
        if !self.config.enabled || !self.store.speed_sampled() {
            return 0.0;
        }
        let Some(previous) = previous else {
            return 0.0;
        };

        let speed = self.store.speed_kmh();
        if speed.is_nan() || speed <= 0.0 {
            return 0.0;
        }

        let mut elapsed = now.saturating_duration_since(previous);
        if elapsed > self.config.max_gap {
            trace!(?elapsed, "Integration gap too large, using fallback");
            elapsed = self.config.fallback_gap;
        }

        let km = speed * elapsed.as_secs_f64() / 3600.0;
        self.store.accumulate_distance(km);
        km
    }

    /// Run on a dedicated thread until the handle is stopped or dropped.
    pub fn spawn(mut self) -> io::Result<TaskHandle> {
        let ticker = tick(self.config.period);
        TaskHandle::spawn("distance-integrator", move |stop| {
            loop {
                select! {
                    recv(ticker) -> now => {
                        if let Ok(now) = now {
                            self.tick_at(now);
                        }
                    }
                    recv(stop) -> _ => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrites_bump_generation_but_advance_does_not() {
        let mut acc = DistanceAccumulator::restore(1.0, 2.0);
        let (trip_gen, odo_gen) = (acc.trip_generation(), acc.odometer_generation());
        acc.advance(0.5);
        assert_eq!(acc.trip_generation(), trip_gen);
        assert_eq!(acc.odometer_generation(), odo_gen);
        acc.set_trip(0.0);
        assert_ne!(acc.trip_generation(), trip_gen);
        assert_eq!(acc.odometer_generation(), odo_gen);
        acc.set_odometer(100.0);
        assert_ne!(acc.odometer_generation(), odo_gen);
    }

    fn tenths_of(events: &[TelemetryEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                TelemetryEvent::TripTenth { tenths } => Some(*tenths),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_large_step_emits_every_tenth() {
        let mut acc = DistanceAccumulator::default();
        let events = acc.advance(0.35);
        assert_eq!(tenths_of(&events), vec![1, 2, 3]);
        assert_eq!(acc.trip_tenths(), 3);
        assert_eq!(acc.odometer_tenths(), 3);
    }

    #[test]
    fn test_small_steps_accumulate() {
        let mut acc = DistanceAccumulator::default();
        let mut all = Vec::new();
        for _ in 0..3 {
            all.extend(acc.advance(0.1));
        }
        assert_eq!(tenths_of(&all), vec![1, 2, 3]);
    }

    #[test]
    fn test_whole_km_follows_completing_tenth() {
        let mut acc = DistanceAccumulator::restore(0.0, 0.95);
        let events = acc.advance(0.1);
        assert_eq!(
            events,
            vec![
                TelemetryEvent::TripTenth { tenths: 1 },
                TelemetryEvent::OdometerTenth { tenths: 10 },
                TelemetryEvent::OdometerKm { km: 1 },
            ]
        );
    }

    #[test]
    fn test_restore_does_not_reemit() {
        let mut acc = DistanceAccumulator::restore(2.34, 1234.5);
        assert_eq!(acc.trip_tenths(), 23);
        assert_eq!(acc.odometer_tenths(), 12345);
        assert!(acc.advance(0.01).is_empty());
    }

    #[test]
    fn test_reset_trip() {
        let mut acc = DistanceAccumulator::restore(5.0, 5.0);
        assert_eq!(acc.set_trip(0.0), 0);
        assert!(acc.trip_km().abs() < f64::EPSILON);
        assert!((acc.odometer_km() - 5.0).abs() < 1e-12);
        assert_eq!(tenths_of(&acc.advance(0.1)), vec![1]);
    }

    #[test]
    fn test_invalid_steps_ignored() {
        let mut acc = DistanceAccumulator::default();
        assert!(acc.advance(-1.0).is_empty());
        assert!(acc.advance(f64::NAN).is_empty());
        assert!(acc.advance(f64::INFINITY).is_empty());
        assert!(acc.trip_km().abs() < f64::EPSILON);
    }
}
