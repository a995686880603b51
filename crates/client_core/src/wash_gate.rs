use shared::protocol::{Trip, Vehicle};

/// True when finalizing `trip` must wait for a wash record.
///
/// The vehicle projection is authoritative when one is available (either
/// passed in or embedded in the trip); otherwise the trip's own wash flag
/// stands in for it. No counting happens here: the backend owns the
/// trips-since-wash counter.
pub fn requires_wash_before_finalize(vehicle: Option<&Vehicle>, trip: &Trip) -> bool {
    let wash_required = match vehicle.or(trip.vehicle.as_ref()) {
        Some(vehicle) => vehicle.requires_wash,
        None => trip.requires_wash,
    };
    wash_required && !trip.washed
}
