//! Plain telemetry state guarded by the store's lock.

use crate::distance::DistanceAccumulator;
use crate::events::{Field, FieldChange, FieldValue};
use cluster_frame::{Indicator, IndicatorSet};
use serde::Serialize;

/// Maps fuel level to engine temperatures.
///
/// The link carries no temperature channel yet, so both gauges are estimated.
pub trait TemperatureModel: Send + Sync {
    /// Returns `(water, oil)` in °C before clamping.
    fn temperatures(&self, fuel_pct: f64) -> (f64, f64);
}

/// Linear estimate: water = 40 + 0.8·fuel, oil = 50 + 0.9·fuel.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuelDerivedTemperature;

impl TemperatureModel for FuelDerivedTemperature {
    fn temperatures(&self, fuel_pct: f64) -> (f64, f64) {
        (40.0 + 0.8 * fuel_pct, 50.0 + 0.9 * fuel_pct)
    }
}

/// Consistent copy of the store, taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub rpm: u32,
    pub speed_kmh: f64,
    pub fuel: f64,
    pub water_temp: f64,
    pub oil_temp: f64,
    pub oil_pressure: f64,
    pub charging_voltage: f64,
    pub air_fuel_ratio: f64,
    #[serde(skip)]
    pub indicators: IndicatorSet,
    pub trip_km: f64,
    pub odometer_km: f64,
    pub suspension: [i32; 4],
    pub exhaust: bool,
    pub first_frame_received: bool,
}

impl TelemetrySnapshot {
    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators.contains(indicator)
    }
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) rpm: u32,
    pub(crate) speed_kmh: f64,
    pub(crate) fuel: f64,
    pub(crate) water_temp: f64,
    pub(crate) oil_temp: f64,
    pub(crate) oil_pressure: f64,
    pub(crate) charging_voltage: f64,
    pub(crate) air_fuel_ratio: f64,
    pub(crate) indicators: IndicatorSet,
    pub(crate) suspension: [i32; 4],
    pub(crate) exhaust: bool,
    pub(crate) first_frame_received: bool,
    /// Set once any speed value has been written.
    pub(crate) speed_sampled: bool,
    pub(crate) distance: DistanceAccumulator,
}

impl State {
    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            rpm: self.rpm,
            speed_kmh: self.speed_kmh,
            fuel: self.fuel,
            water_temp: self.water_temp,
            oil_temp: self.oil_temp,
            oil_pressure: self.oil_pressure,
            charging_voltage: self.charging_voltage,
            air_fuel_ratio: self.air_fuel_ratio,
            indicators: self.indicators,
            trip_km: self.distance.trip_km(),
            odometer_km: self.distance.odometer_km(),
            suspension: self.suspension,
            exhaust: self.exhaust,
            first_frame_received: self.first_frame_received,
        }
    }

    pub(crate) fn set_rpm(&mut self, rpm: u32) -> Option<FieldChange> {
        if self.rpm == rpm {
            return None;
        }
        let old = std::mem::replace(&mut self.rpm, rpm);
        Some(FieldChange {
            field: Field::Rpm,
            old: FieldValue::Uint(old),
            new: FieldValue::Uint(rpm),
        })
    }

    fn scalar_slot(&mut self, field: Field) -> Option<&mut f64> {
        match field {
            Field::SpeedKmh => Some(&mut self.speed_kmh),
            Field::Fuel => Some(&mut self.fuel),
            Field::WaterTemp => Some(&mut self.water_temp),
            Field::OilTemp => Some(&mut self.oil_temp),
            Field::OilPressure => Some(&mut self.oil_pressure),
            Field::ChargingVoltage => Some(&mut self.charging_voltage),
            Field::AirFuelRatio => Some(&mut self.air_fuel_ratio),
            Field::Rpm | Field::Indicator(_) => None,
        }
    }

    /// Clamp and store a floating-point gauge.
    ///
    /// NaN is ignored; equality is bit-exact after clamping.
    pub(crate) fn set_scalar(&mut self, field: Field, value: f64) -> Option<FieldChange> {
        if value.is_nan() {
            return None;
        }
        if field == Field::SpeedKmh {
            self.speed_sampled = true;
        }
        let value = match field.range() {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        };
        let slot = self.scalar_slot(field)?;
        if slot.to_bits() == value.to_bits() {
            return None;
        }
        let old = std::mem::replace(slot, value);
        Some(FieldChange {
            field,
            old: FieldValue::Float(old),
            new: FieldValue::Float(value),
        })
    }

    pub(crate) fn scalar(&self, field: Field) -> Option<f64> {
        match field {
            Field::SpeedKmh => Some(self.speed_kmh),
            Field::Fuel => Some(self.fuel),
            Field::WaterTemp => Some(self.water_temp),
            Field::OilTemp => Some(self.oil_temp),
            Field::OilPressure => Some(self.oil_pressure),
            Field::ChargingVoltage => Some(self.charging_voltage),
            Field::AirFuelRatio => Some(self.air_fuel_ratio),
            Field::Rpm | Field::Indicator(_) => None,
        }
    }

    pub(crate) fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Option<FieldChange> {
        let old = self.indicators.contains(indicator);
        if old == on {
            return None;
        }
        self.indicators.set(indicator, on);
        Some(FieldChange {
            field: Field::Indicator(indicator),
            old: FieldValue::Bool(old),
            new: FieldValue::Bool(on),
        })
    }
}
