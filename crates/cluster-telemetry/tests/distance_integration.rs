//! Distance integration and watermark emission.

use cluster_telemetry::{
    DistanceIntegrator, FlagLayout, IntegratorConfig, MemorySettings, TelemetryEvent,
    TelemetryStore,
};
use cluster_test_helpers::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn store_at(speed_kmh: f64) -> Arc<TelemetryStore> {
    let store = Arc::new(TelemetryStore::default());
    store.set_speed_kmh(speed_kmh);
    store
}

#[test]
fn test_skips_until_speed_sampled() {
    let store = Arc::new(TelemetryStore::default());
    let mut integrator = DistanceIntegrator::new(store.clone(), IntegratorConfig::default());
    let t0 = Instant::now();
    assert!(integrator.tick_at(t0).abs() < f64::EPSILON);
    assert!(integrator.tick_at(t0 + Duration::from_secs(1)).abs() < f64::EPSILON);
    assert!(store.trip_km().abs() < f64::EPSILON);
}

#[test]
fn test_disabled_integrator_does_nothing() {
    let store = store_at(100.0);
    let config = IntegratorConfig {
        enabled: false,
        ..IntegratorConfig::default()
    };
    let mut integrator = DistanceIntegrator::new(store.clone(), config);
    let t0 = Instant::now();
    integrator.tick_at(t0);
    integrator.tick_at(t0 + Duration::from_secs(1));
    assert!(store.odometer_km().abs() < f64::EPSILON);
}

#[test]
fn test_integrates_speed_over_time() {
    let store = store_at(36.0);
    let mut integrator = DistanceIntegrator::new(store.clone(), IntegratorConfig::default());
    let t0 = Instant::now();
    integrator.tick_at(t0);
    // 36 km/h for 4 s is 0.04 km
    let km = integrator.tick_at(t0 + Duration::from_secs(4));
    assert!((km - 0.04).abs() < 1e-12);
    assert!((store.trip_km() - 0.04).abs() < 1e-12);
}

#[test]
fn test_stopped_vehicle_only_moves_clock() {
    let store = store_at(0.0);
    let mut integrator = DistanceIntegrator::new(store.clone(), IntegratorConfig::default());
    let t0 = Instant::now();
    integrator.tick_at(t0);
    integrator.tick_at(t0 + Duration::from_secs(3));
    store.set_speed_kmh(36.0);
    // only the 1 s since the previous tick counts
    let km = integrator.tick_at(t0 + Duration::from_secs(4));
    assert!((km - 0.01).abs() < 1e-12);
}

#[test]
fn test_long_gap_uses_fallback() {
    let store = store_at(360.0);
    let mut integrator = DistanceIntegrator::new(store.clone(), IntegratorConfig::default());
    let t0 = Instant::now();
    integrator.tick_at(t0);
    // a 10 minute suspend counts as one second: 0.1 km
    let km = integrator.tick_at(t0 + Duration::from_secs(600));
    assert!((km - 0.1).abs() < 1e-12);
}

#[test]
fn test_persist_and_notify_every_tenth() {
    let settings = Arc::new(MemorySettings::new());
    let store = Arc::new(TelemetryStore::with_settings(
        FlagLayout::REFERENCE,
        settings.clone(),
    ));
    let (recorder, _) = RecordingObserver::attach(&store);

    store.accumulate_distance(1.05);

    let expected: Vec<u64> = (1..=10).collect();
    assert_eq!(recorder.trip_tenths(), expected);
    assert_eq!(recorder.odometer_tenths(), expected);
    assert_eq!(
        recorder.count(|e| matches!(e, TelemetryEvent::OdometerKm { km: 1 })),
        1
    );
    assert_eq!(settings.writes(), 20);
}

#[test]
fn test_spawned_integrator_stops() -> TestResult {
    let store = store_at(3600.0);
    let config = IntegratorConfig {
        period: Duration::from_millis(5),
        ..IntegratorConfig::default()
    };
    let handle = DistanceIntegrator::new(store.clone(), config).spawn()?;
    std::thread::sleep(Duration::from_millis(60));
    handle.stop();
    let after_stop = store.odometer_km();
    assert!(after_stop > 0.0);
    std::thread::sleep(Duration::from_millis(20));
    assert!((store.odometer_km() - after_stop).abs() < f64::EPSILON);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// However the distance arrives, trip notifications step by exactly one
    /// tenth with nothing skipped or repeated.
    #[test]
    fn prop_watermarks_are_monotonic(steps in proptest::collection::vec(0.0f64..3.0, 1..60)) {
        let store = TelemetryStore::default();
        let (recorder, _) = RecordingObserver::attach(&store);
        for step in &steps {
            store.accumulate_distance(*step);
        }

        let trip = recorder.trip_tenths();
        for (i, tenths) in trip.iter().enumerate() {
            prop_assert_eq!(*tenths, i as u64 + 1);
        }
        let odo = recorder.odometer_tenths();
        prop_assert_eq!(&odo, &trip);

        let total: f64 = steps.iter().sum();
        let expected = (total * 10.0 + 1e-9).floor() as u64;
        prop_assert_eq!(trip.len() as u64, expected);
    }
}
