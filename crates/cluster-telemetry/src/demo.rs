//! Synthetic telemetry for running the cluster without a vehicle.
//!
//! One generator, two schedules: [`Schedule::Pull`] leaves timing to the
//! caller (a UI frame timer calls [`DemoGenerator::poll`]), and
//! [`Schedule::Push`] owns a thread that ticks at a fixed interval. The
//! schedule is fixed when the generator is started.

use crate::store::TelemetryStore;
use crate::task::TaskHandle;
use cluster_frame::{FlagLayout, Indicator, IndicatorSet};
use crossbeam::channel::tick;
use crossbeam::select;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Default push interval, about 60 Hz.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_millis(16);

/// One synthetic reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSample {
    pub rpm: u16,
    pub speed_kmh: f64,
    pub indicators: IndicatorSet,
    pub fuel_pct: u8,
}

impl SyntheticSample {
    /// Pack into a wire `flags` word.
    pub fn flags(&self, layout: FlagLayout) -> u16 {
        layout.encode(self.indicators, self.fuel_pct)
    }
}

/// Deterministic sweep: a triangle wave for rpm and speed, alternating
/// blinkers, and the high beam above a rpm threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    pub period_s: f64,
    pub max_rpm: f64,
    pub max_speed_kmh: f64,
    pub blink_half_period_s: f64,
    pub high_beam_rpm: u16,
    pub fuel_pct: u8,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            period_s: 5.0,
            max_rpm: 8000.0,
            max_speed_kmh: 220.0,
            blink_half_period_s: 0.5,
            high_beam_rpm: 6000,
            fuel_pct: 75,
        }
    }
}

impl Waveform {
    /// Sample at `t` seconds since the generator started.
    pub fn sample(&self, t: f64) -> SyntheticSample {
        let t = if t.is_finite() { t.max(0.0) } else { 0.0 };
        let phase = (t % self.period_s) / self.period_s;
        let frac = if phase < 0.5 {
            phase * 2.0
        } else {
            2.0 - phase * 2.0
        };

        let rpm = (frac * self.max_rpm).clamp(0.0, f64::from(u16::MAX)) as u16;
        let speed_kmh = frac * self.max_speed_kmh;
        let left = (t / self.blink_half_period_s).floor() as u64 % 2 == 0;

        let mut indicators = IndicatorSet::EMPTY;
        indicators.set(Indicator::LeftBlink, left);
        indicators.set(Indicator::RightBlink, !left);
        indicators.set(Indicator::HighBeam, rpm > self.high_beam_rpm);

        SyntheticSample {
            rpm,
            speed_kmh,
            indicators,
            fuel_pct: self.fuel_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// The caller drives ticks through [`DemoGenerator::poll`].
    Pull,
    /// An owned thread ticks every `interval`.
    Push { interval: Duration },
}

impl Schedule {
    pub fn push() -> Self {
        Schedule::Push {
            interval: DEFAULT_PUSH_INTERVAL,
        }
    }
}

/// Feeds [`Waveform`] samples into a store.
#[derive(Debug)]
pub struct DemoGenerator {
    store: Arc<TelemetryStore>,
    waveform: Waveform,
    started: Instant,
}

impl DemoGenerator {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self::with_waveform(store, Waveform::default())
    }

    pub fn with_waveform(store: Arc<TelemetryStore>, waveform: Waveform) -> Self {
        Self {
            store,
            waveform,
            started: Instant::now(),
        }
    }

    /// Apply the sample for the current time.
    pub fn poll(&self) -> SyntheticSample {
        self.poll_at(self.started.elapsed().as_secs_f64())
    }

    /// Apply the sample for `t` seconds after start.
    pub fn poll_at(&self, t: f64) -> SyntheticSample {
        let sample = self.waveform.sample(t);
        let flags = sample.flags(self.store.layout());
        self.store.update_from_frame(sample.rpm, sample.speed_kmh, flags);
        sample
    }

    /// Fix the schedule and begin producing.
    pub fn start(self, schedule: Schedule) -> io::Result<DemoDriver> {
        match schedule {
            Schedule::Pull => {
                info!("Demo generator started (pull)");
                Ok(DemoDriver::Pull(self))
            }
            Schedule::Push { interval } => {
                info!(?interval, "Demo generator started (push)");
                let ticker = tick(interval);
                let handle = TaskHandle::spawn("demo-generator", move |stop| {
                    loop {
                        select! {
                            recv(ticker) -> _ => {
                                self.poll();
                            }
                            recv(stop) -> _ => break,
                        }
                    }
                })?;
                Ok(DemoDriver::Push(handle))
            }
        }
    }
}

/// A started generator.
#[derive(Debug)]
pub enum DemoDriver {
    Pull(DemoGenerator),
    Push(TaskHandle),
}

impl DemoDriver {
    /// The generator to poll, in pull mode.
    pub fn generator(&self) -> Option<&DemoGenerator> {
        match self {
            DemoDriver::Pull(generator) => Some(generator),
            DemoDriver::Push(_) => None,
        }
    }

    pub fn stop(self) {
        match self {
            DemoDriver::Pull(_) => {}
            DemoDriver::Push(handle) => handle.stop(),
        }
        info!("Demo generator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_wave_extremes() {
        let wave = Waveform::default();
        let start = wave.sample(0.0);
        assert_eq!(start.rpm, 0);
        let peak = wave.sample(2.5);
        assert_eq!(peak.rpm, 8000);
        assert!((peak.speed_kmh - 220.0).abs() < 1e-9);
        assert!(peak.indicators.contains(Indicator::HighBeam));
        let wrapped = wave.sample(5.0);
        assert_eq!(wrapped.rpm, 0);
    }

    #[test]
    fn test_blinkers_alternate_every_half_second() {
        let wave = Waveform::default();
        let a = wave.sample(0.1);
        let b = wave.sample(0.6);
        assert!(a.indicators.contains(Indicator::LeftBlink));
        assert!(!a.indicators.contains(Indicator::RightBlink));
        assert!(b.indicators.contains(Indicator::RightBlink));
        assert!(!b.indicators.contains(Indicator::LeftBlink));
    }

    #[test]
    fn test_poll_at_drives_store() {
        let store = Arc::new(TelemetryStore::default());
        let generator = DemoGenerator::new(store.clone());
        let sample = generator.poll_at(1.25);
        assert_eq!(store.rpm(), u32::from(sample.rpm));
        assert!((store.fuel() - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_garbage_time_is_safe() {
        let sample = Waveform::default().sample(f64::NAN);
        assert_eq!(sample.rpm, 0);
    }
}
