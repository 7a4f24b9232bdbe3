//! Semantic unit types for type-safe quantity handling
//!
//! Newtype wrappers that keep kilometres, wind speeds, hours, angles and fire
//! radiative power from being mixed up as bare floats.
//!
//! # Design Philosophy
//! - All types use f64: geodesic math over thousands of kilometres loses
//!   meaningful precision in f32
//! - Implements common traits (Add, Sub, Mul, Div, Ord, Display, etc.)
//! - Cross-type operations where the transport model needs them
//!   (`Kilometers / Hours = KilometersPerHour`, `KilometersPerHour * Hours`
//!   gives a signed displacement in km)
//! - Total ordering via Ord trait (NaN handled as greater than all values)
//! - Serde support, serialized transparently as the inner float
//!
//! # Usage
//! ```
//! use haze_core::core_types::units::{Hours, Kilometers, KilometersPerHour};
//!
//! let speed = KilometersPerHour::new(15.0);
//! let travelled_km = speed * Hours::new(2.0);
//! assert!((travelled_km - 30.0).abs() < 1e-9);
//!
//! let average: KilometersPerHour = Kilometers::new(30.0) / Hours::new(2.0);
//! assert!((*average - 15.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Deref, Div, Mul, Sub};

/// Compare f64 values with total ordering using Rust's built-in `total_cmp`
#[inline]
fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Distance in kilometres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilometers(f64);

impl Eq for Kilometers {}

impl PartialOrd for Kilometers {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Kilometers {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Kilometers {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Kilometers {
    /// Create a new Kilometers value. NaN is accepted so invalid coordinates
    /// propagate instead of panicking.
    #[inline]
    #[must_use]
    #[track_caller]
    #[allow(clippy::neg_cmp_op_on_partial_ord)] // NaN must pass
    pub const fn new(value: f64) -> Self {
        assert!(
            !(value < 0.0),
            "Kilometers::new: negative distance is invalid"
        );
        Kilometers(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<Kilometers> for f64 {
    fn from(k: Kilometers) -> f64 {
        k.0
    }
}

impl Add for Kilometers {
    type Output = Kilometers;
    fn add(self, rhs: Kilometers) -> Kilometers {
        Kilometers(self.0 + rhs.0)
    }
}

impl Sub for Kilometers {
    type Output = Kilometers;
    fn sub(self, rhs: Kilometers) -> Kilometers {
        Kilometers(self.0 - rhs.0)
    }
}

impl Mul<f64> for Kilometers {
    type Output = Kilometers;
    fn mul(self, rhs: f64) -> Kilometers {
        Kilometers(self.0 * rhs)
    }
}

impl Div<f64> for Kilometers {
    type Output = Kilometers;
    fn div(self, rhs: f64) -> Kilometers {
        Kilometers(self.0 / rhs)
    }
}

// Cross-type operation: kilometres / hours = km/h
impl Div<Hours> for Kilometers {
    type Output = KilometersPerHour;
    fn div(self, rhs: Hours) -> KilometersPerHour {
        KilometersPerHour(self.0 / rhs.0)
    }
}

impl PartialEq<f64> for Kilometers {
    fn eq(&self, other: &f64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<f64> for Kilometers {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for Kilometers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} km", self.0)
    }
}

// ============================================================================
// TIME AND VELOCITY
// ============================================================================

/// Time span in hours
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Hours(f64);

impl Eq for Hours {}

impl PartialOrd for Hours {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hours {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Hours {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Hours {
    /// One simulation step
    pub const ONE: Hours = Hours(1.0);

    /// Create a new time span (negative spans are allowed for "in the future")
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Hours(value)
    }

    /// Hours elapsed between two instants (`later - earlier`)
    #[must_use]
    pub fn between(earlier: chrono::DateTime<chrono::Utc>, later: chrono::DateTime<chrono::Utc>) -> Self {
        Hours((later - earlier).num_seconds() as f64 / 3600.0)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Hours {
    fn from(v: f64) -> Self {
        Hours(v)
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} h", self.0)
    }
}

/// Wind speed in kilometres per hour
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct KilometersPerHour(f64);

impl Eq for KilometersPerHour {}

impl PartialOrd for KilometersPerHour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KilometersPerHour {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for KilometersPerHour {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl KilometersPerHour {
    /// Create a new `KilometersPerHour` value.
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        KilometersPerHour(value)
    }

    /// Convert from metres per second (ERA5 reports 10 m wind in m/s)
    #[inline]
    #[must_use]
    pub fn from_mps(mps: f64) -> Self {
        KilometersPerHour(mps * 3.6)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for KilometersPerHour {
    fn from(v: f64) -> Self {
        KilometersPerHour::new(v)
    }
}

impl Mul<f64> for KilometersPerHour {
    type Output = KilometersPerHour;
    fn mul(self, rhs: f64) -> KilometersPerHour {
        KilometersPerHour(self.0 * rhs)
    }
}

// Cross-type operation: km/h × hours = kilometres (signed displacement is
// handled by the caller, so no non-negativity check here)
impl Mul<Hours> for KilometersPerHour {
    type Output = f64;
    fn mul(self, rhs: Hours) -> f64 {
        self.0 * rhs.0
    }
}

impl fmt::Display for KilometersPerHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} km/h", self.0)
    }
}

// ============================================================================
// ANGLE
// ============================================================================

/// Angle in degrees (compass bearings, meteorological wind directions)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Degrees(f64);

impl Eq for Degrees {}

impl PartialOrd for Degrees {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Degrees {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Degrees {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Degrees {
    /// Create a new angle in degrees
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Degrees(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Convert to radians
    #[inline]
    #[must_use]
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }

    /// Wrap into `[0, 360)`
    #[inline]
    #[must_use]
    pub fn normalized(self) -> Self {
        Degrees(self.0.rem_euclid(360.0))
    }

    /// The opposite compass direction, e.g. the heading a wind blows towards
    /// given the direction it blows from
    #[inline]
    #[must_use]
    pub fn reversed(self) -> Self {
        Degrees(self.0 + 180.0).normalized()
    }
}

impl From<f64> for Degrees {
    fn from(v: f64) -> Self {
        Degrees(v)
    }
}

impl From<Degrees> for f64 {
    fn from(d: Degrees) -> f64 {
        d.0
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

// ============================================================================
// FIRE INTENSITY
// ============================================================================

/// Fire radiative power in megawatts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megawatts(f64);

impl Eq for Megawatts {}

impl PartialOrd for Megawatts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Megawatts {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Megawatts {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Megawatts {
    /// No radiative power
    pub const ZERO: Megawatts = Megawatts(0.0);

    /// Create a new FRP value.
    #[inline]
    #[must_use]
    #[track_caller]
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub const fn new(value: f64) -> Self {
        assert!(!(value < 0.0), "Megawatts::new: negative FRP is invalid");
        Megawatts(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Add for Megawatts {
    type Output = Megawatts;
    fn add(self, rhs: Megawatts) -> Megawatts {
        Megawatts(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Megawatts {
    fn sum<I: Iterator<Item = Megawatts>>(iter: I) -> Megawatts {
        iter.fold(Megawatts::ZERO, |acc, m| acc + m)
    }
}

impl Div<Megawatts> for Megawatts {
    type Output = f64;
    fn div(self, rhs: Megawatts) -> f64 {
        self.0 / rhs.0
    }
}

impl fmt::Display for Megawatts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} MW", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kmh_times_hours_equals_km() {
        let speed = KilometersPerHour(60.0);
        let time = Hours(2.0);
        assert!((speed * time - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_km_divided_by_hours_equals_kmh() {
        let distance = Kilometers(120.0);
        let speed: KilometersPerHour = distance / Hours(2.0);
        assert!((speed.0 - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_mps_conversion() {
        let speed = KilometersPerHour::from_mps(10.0);
        assert!((*speed - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_degrees_normalize_and_reverse() {
        assert_eq!(Degrees::new(-90.0).normalized(), Degrees::new(270.0));
        assert_eq!(Degrees::new(720.0).normalized(), Degrees::new(0.0));
        assert_eq!(Degrees::new(225.0).reversed(), Degrees::new(45.0));
        assert_eq!(Degrees::new(90.0).reversed(), Degrees::new(270.0));
    }

    #[test]
    fn test_megawatts_sum() {
        let total: Megawatts = [10.0, 20.5, 0.0].into_iter().map(Megawatts::new).sum();
        assert!((*total - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_nan_distance_is_accepted() {
        let d = Kilometers::new(f64::NAN);
        assert!(d.is_nan());
    }

    #[test]
    #[should_panic(expected = "negative distance")]
    fn test_negative_distance_panics() {
        let _ = Kilometers::new(-1.0);
    }

    #[test]
    fn test_hours_between() {
        let t0 = chrono::DateTime::parse_from_rfc3339("2019-09-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let t1 = t0 + chrono::Duration::minutes(90);
        assert!((*Hours::between(t0, t1) - 1.5).abs() < 1e-9);
        assert!((*Hours::between(t1, t0) + 1.5).abs() < 1e-9);
    }
}
