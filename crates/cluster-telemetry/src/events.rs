//! Change events published by the telemetry store.

use cluster_frame::Indicator;
use serde::{Deserialize, Serialize};

/// A single observable field of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Rpm,
    SpeedKmh,
    Fuel,
    WaterTemp,
    OilTemp,
    OilPressure,
    ChargingVoltage,
    AirFuelRatio,
    Indicator(Indicator),
}

impl Field {
    /// Inclusive clamp range for scalar gauges, `None` when unclamped.
    pub fn range(self) -> Option<(f64, f64)> {
        match self {
            Field::Fuel => Some((0.0, 100.0)),
            Field::WaterTemp => Some((0.0, 150.0)),
            Field::OilTemp => Some((0.0, 160.0)),
            Field::AirFuelRatio => Some((0.0, 25.0)),
            Field::ChargingVoltage => Some((0.0, 20.0)),
            Field::OilPressure => Some((0.0, 10.0)),
            Field::Rpm | Field::SpeedKmh | Field::Indicator(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Rpm => "rpm",
            Field::SpeedKmh => "speed_kmh",
            Field::Fuel => "fuel",
            Field::WaterTemp => "water_temp",
            Field::OilTemp => "oil_temp",
            Field::OilPressure => "oil_pressure",
            Field::ChargingVoltage => "charging_voltage",
            Field::AirFuelRatio => "air_fuel_ratio",
            Field::Indicator(indicator) => indicator.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Uint(u32),
    Float(f64),
    Bool(bool),
}

/// Old and new value of a field that actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: Field,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Parameterless menu navigation triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavEvent {
    Up,
    Down,
    Select,
    Back,
}

/// Everything a consumer of the store can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Changed(FieldChange),
    /// First frame since the store was created; fires once.
    FirstFrame,
    /// Trip crossed (or was reset to) a tenth-of-a-km boundary.
    TripTenth { tenths: u64 },
    /// Odometer crossed a tenth-of-a-km boundary.
    OdometerTenth { tenths: u64 },
    /// Odometer crossed a whole km boundary.
    OdometerKm { km: u64 },
    Suspension { corners: [i32; 4] },
    Exhaust { enabled: bool },
    Navigation { nav: NavEvent },
}

impl TelemetryEvent {
    /// Distance in km carried by a trip or odometer event.
    pub fn distance_km(&self) -> Option<f64> {
        match *self {
            TelemetryEvent::TripTenth { tenths } | TelemetryEvent::OdometerTenth { tenths } => {
                Some(tenths as f64 / 10.0)
            }
            TelemetryEvent::OdometerKm { km } => Some(km as f64),
            _ => None,
        }
    }
}

/// Handle returned by [`crate::TelemetryStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);
