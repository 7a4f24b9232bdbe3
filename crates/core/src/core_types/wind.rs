//! Hourly wind observations and forecasts

use crate::core_types::units::{Degrees, KilometersPerHour};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hourly wind sample at a location
///
/// `direction` follows the meteorological convention: the compass direction
/// the wind blows *from* (270° is a westerly, pushing air eastwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindSample {
    pub speed: KilometersPerHour,
    pub direction: Degrees,
}

impl WindSample {
    pub const fn new(speed: KilometersPerHour, direction: Degrees) -> Self {
        WindSample { speed, direction }
    }

    /// Convenience constructor from raw km/h and degrees
    pub const fn from_raw(speed_kmh: f64, direction_deg: f64) -> Self {
        WindSample {
            speed: KilometersPerHour::new(speed_kmh),
            direction: Degrees::new(direction_deg),
        }
    }

    /// Eastward (u) and northward (v) velocity of the air mass in km/h.
    ///
    /// The flow heads away from `direction`, hence the negated projection.
    #[inline]
    pub fn velocity_components(&self) -> (f64, f64) {
        let theta = self.direction.to_radians();
        let u = -*self.speed * theta.sin();
        let v = -*self.speed * theta.cos();
        (u, v)
    }
}

/// A wind sample stamped with its valid time, as stored in the weather grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedWind {
    pub timestamp: DateTime<Utc>,
    pub sample: WindSample,
}

/// A constant wind repeated for `hours` samples
pub fn constant_wind(speed_kmh: f64, direction_deg: f64, hours: usize) -> Vec<WindSample> {
    vec![WindSample::from_raw(speed_kmh, direction_deg); hours]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_westerly_pushes_east() {
        let (u, v) = WindSample::from_raw(10.0, 270.0).velocity_components();
        assert_relative_eq!(u, 10.0, epsilon = 1e-9);
        assert_relative_eq!(v, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_southerly_pushes_north() {
        let (u, v) = WindSample::from_raw(10.0, 180.0).velocity_components();
        assert_relative_eq!(u, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_southwesterly_pushes_northeast() {
        let w = WindSample::from_raw(15.0, 225.0);
        let (u, v) = w.velocity_components();
        assert!(u > 0.0 && v > 0.0);
        assert_relative_eq!(u, v, epsilon = 1e-9);
    }

    #[test]
    fn test_calm_has_no_velocity() {
        let (u, v) = WindSample::from_raw(0.0, 123.0).velocity_components();
        assert_eq!(u.abs(), 0.0);
        assert_eq!(v.abs(), 0.0);
    }
}
