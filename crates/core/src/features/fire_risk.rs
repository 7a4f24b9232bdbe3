//! Fire risk score
//!
//! Collapses a set of hotspot detections into a single 0-100 risk value.
//! Each detection contributes the product of four independent weights:
//!
//! ```text
//! intensity  = min(FRP / 100 MW, 1)
//! distance   = exp(-d / 1000 km)
//! recency    = exp(-age / 24 h)         (1.0 when the age is unknown)
//! wind       = 1 - |Δθ| / 180           (0.5 when no wind is supplied)
//! score      = min(10 × Σ contributions, 100)
//! ```
//!
//! `Δθ` is the separation between the wind's heading (where it blows to) and
//! the bearing from the fire to the target, so a wind carrying smoke straight
//! at the target weighs 1.0 and one carrying it straight away weighs 0.0.

use crate::core_types::fire::FireDetection;
use crate::core_types::geo::GeoPoint;
use crate::core_types::units::{Degrees, Hours, Megawatts};
use crate::features::geospatial::{angle_difference, bearing, distance};
use chrono::{DateTime, Utc};

/// FRP at which the intensity weight saturates
pub const INTENSITY_REFERENCE: Megawatts = Megawatts::new(100.0);

/// Characteristic e-folding distance of the distance weight (km)
pub const DISTANCE_DECAY_KM: f64 = 1000.0;

/// Characteristic e-folding age of the recency weight (h)
pub const RECENCY_DECAY_HOURS: f64 = 24.0;

/// Recency weight for detections without a usable acquisition time
pub const FRESH_RECENCY_WEIGHT: f64 = 1.0;

/// Wind weight when no wind direction is known
pub const NEUTRAL_WIND_FAVORABILITY: f64 = 0.5;

/// Multiplier applied to the summed contributions before capping
pub const SCORE_SCALE: f64 = 10.0;

/// Upper bound of every feature score
pub const MAX_SCORE: f64 = 100.0;

/// Intensity weight in `[0, 1]`
#[inline]
pub fn intensity_weight(frp: Megawatts) -> f64 {
    (frp / INTENSITY_REFERENCE).clamp(0.0, 1.0)
}

/// Distance weight in `(0, 1]`
#[inline]
pub fn distance_weight(fire: GeoPoint, target: GeoPoint) -> f64 {
    (-*distance(fire, target) / DISTANCE_DECAY_KM).exp()
}

/// Recency weight in `(0, 1]`
///
/// Detections stamped after the reference time count as fresh.
#[inline]
pub fn recency_weight(acquired_at: Option<DateTime<Utc>>, reference_time: DateTime<Utc>) -> f64 {
    match acquired_at {
        Some(t) => {
            let age = Hours::between(t, reference_time).value().max(0.0);
            (-age / RECENCY_DECAY_HOURS).exp()
        }
        None => FRESH_RECENCY_WEIGHT,
    }
}

/// Wind favorability in `[0, 1]`
///
/// `wind_direction` is meteorological (the direction the wind blows from).
/// It is reversed to a heading before comparison with the bearing to the
/// target, unlike a plain `1 - |direction - bearing| / 180`: a wind blowing
/// towards the target scores 1.0.
#[inline]
pub fn wind_favorability(fire: GeoPoint, target: GeoPoint, wind_direction: Option<Degrees>) -> f64 {
    match wind_direction {
        Some(from) => {
            let to_target = bearing(fire, target);
            let off_axis = angle_difference(from.reversed(), to_target);
            1.0 - *off_axis / 180.0
        }
        None => NEUTRAL_WIND_FAVORABILITY,
    }
}

/// Contribution of one detection before scaling
pub fn detection_contribution(
    detection: &FireDetection,
    target: GeoPoint,
    reference_time: DateTime<Utc>,
    wind_direction: Option<Degrees>,
) -> f64 {
    intensity_weight(detection.frp)
        * distance_weight(detection.position, target)
        * recency_weight(detection.acquired_at, reference_time)
        * wind_favorability(detection.position, target, wind_direction)
}

/// Fire risk score in `[0, 100]`
///
/// Returns 0 for an empty detection set. Detections whose contribution is not
/// finite (invalid coordinates) are ignored.
pub fn calculate_fire_risk_score(
    detections: &[FireDetection],
    target: GeoPoint,
    reference_time: DateTime<Utc>,
    wind_direction: Option<Degrees>,
) -> f64 {
    if detections.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut skipped = 0usize;
    for d in detections {
        let c = detection_contribution(d, target, reference_time, wind_direction);
        if c.is_finite() {
            total += c;
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "ignored detections with non-finite risk contribution");
    }

    (total * SCORE_SCALE).clamp(0.0, MAX_SCORE)
}
