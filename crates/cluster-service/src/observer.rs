//! Logs store events.

use cluster_telemetry::{Field, TelemetryEvent};
use tracing::{debug, info, trace};

/// Log one event. Gauge changes arrive at frame rate and go to `trace`,
/// whole odometer km to `info`, everything else to `debug`.
pub fn log_event(event: &TelemetryEvent) {
    match event {
        TelemetryEvent::FirstFrame => debug!("First frame event"),
        TelemetryEvent::Changed(change) => match change.field {
            Field::Indicator(indicator) => {
                debug!(?indicator, new = ?change.new, "Indicator changed");
            }
            field => trace!(field = field.name(), old = ?change.old, new = ?change.new, "Gauge changed"),
        },
        TelemetryEvent::TripTenth { tenths } => debug!(tenths, "Trip advanced"),
        TelemetryEvent::OdometerTenth { tenths } => debug!(tenths, "Odometer advanced"),
        TelemetryEvent::OdometerKm { km } => info!(km, "Odometer reached whole km"),
        TelemetryEvent::Suspension { corners } => debug!(?corners, "Suspension saved"),
        TelemetryEvent::Exhaust { enabled } => debug!(enabled, "Exhaust mode saved"),
        TelemetryEvent::Navigation { nav } => debug!(?nav, "Navigation"),
    }
}
