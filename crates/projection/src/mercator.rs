//! Spherical Web Mercator (EPSG:3857).
//!
//! Imagery services and desktop GIS layers commonly report extents in this
//! projection. The forward and inverse formulas use the WGS84 semi-major axis
//! as the sphere radius, as EPSG:3857 defines.

use std::f64::consts::PI;

/// Sphere radius used by EPSG:3857 (meters).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude beyond which Web Mercator is undefined in practice (degrees).
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convert Web Mercator meters to `(lon, lat)` degrees.
pub fn to_geographic(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Convert `(lon, lat)` degrees to Web Mercator meters.
///
/// Latitude is clamped to ±[`MAX_LATITUDE`] so the poles map to the
/// projection's square extent instead of infinity.
pub fn from_geographic(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}
