use crate::models::driver::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Below this planar distance a simulated position is snapped onto its
/// destination instead of creeping toward it forever.
pub const ARRIVAL_EPSILON_DEG: f64 = 1e-5;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Planar distance in coordinate degrees, used by the position simulator to
/// decide arrival and by its tests to assert monotonic approach.
pub fn euclidean_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = b.lat - a.lat;
    let d_lng = b.lng - a.lng;
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}

/// Linear interpolation one fractional step from `from` toward `to`.
/// `fraction` is clamped to (0, 1], so the result can never overshoot the
/// destination; within [`ARRIVAL_EPSILON_DEG`] it lands exactly on `to`.
pub fn step_toward(from: &GeoPoint, to: &GeoPoint, fraction: f64) -> GeoPoint {
    let fraction = fraction.clamp(f64::MIN_POSITIVE, 1.0);

    if euclidean_deg(from, to) <= ARRIVAL_EPSILON_DEG {
        return *to;
    }

    GeoPoint {
        lat: from.lat + (to.lat - from.lat) * fraction,
        lng: from.lng + (to.lng - from.lng) * fraction,
    }
}
