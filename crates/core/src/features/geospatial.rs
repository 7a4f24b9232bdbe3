//! Great-circle distance, initial bearing and angular separation
//!
//! Pure functions on a spherical Earth. Invalid (NaN) coordinates propagate
//! as NaN rather than failing.

use crate::core_types::geo::GeoPoint;
use crate::core_types::units::{Degrees, Kilometers};

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two points
///
/// Symmetric, and `distance(p, p) == 0`.
pub fn distance(p1: GeoPoint, p2: GeoPoint) -> Kilometers {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // rounding can push `a` a hair outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Kilometers::new(EARTH_RADIUS_KM * c)
}

/// Initial compass bearing from `from` to `to` in `[0, 360)`
///
/// 0° is north, 90° east.
pub fn bearing(from: GeoPoint, to: GeoPoint) -> Degrees {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let x = d_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    Degrees::new(x.atan2(y).to_degrees()).normalized()
}

/// Minimum wrap-around separation between two compass angles, in `[0, 180]`
///
/// `angle_difference(10, 350) == 20`.
pub fn angle_difference(a: Degrees, b: Degrees) -> Degrees {
    let diff = (*a - *b).rem_euclid(360.0);
    Degrees::new(if diff > 180.0 { 360.0 - diff } else { diff })
}
