//! Satellite fire detections and the clusters derived from them

use crate::core_types::geo::GeoPoint;
use crate::core_types::units::Megawatts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detection confidence as reported by FIRMS
///
/// VIIRS reports letter codes (`l`, `n`, `h`), MODIS a 0-100 percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceClass {
    Low,
    Nominal,
    High,
}

impl ConfidenceClass {
    /// Parse a FIRMS confidence field. Percentages follow the MODIS
    /// thresholds (<30 low, 30-79 nominal, >=80 high).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "l" | "low" => return Some(ConfidenceClass::Low),
            "n" | "nominal" => return Some(ConfidenceClass::Nominal),
            "h" | "high" => return Some(ConfidenceClass::High),
            _ => {}
        }

        let pct: f64 = raw.parse().ok()?;
        if !pct.is_finite() {
            return None;
        }
        Some(if pct < 30.0 {
            ConfidenceClass::Low
        } else if pct < 80.0 {
            ConfidenceClass::Nominal
        } else {
            ConfidenceClass::High
        })
    }
}

/// One satellite hotspot observation
///
/// Immutable once ingested. `acquired_at` is `None` when the source timestamp
/// was missing or unparseable; scoring treats such detections as fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireDetection {
    pub position: GeoPoint,
    pub frp: Megawatts,
    pub acquired_at: Option<DateTime<Utc>>,
    pub confidence: Option<ConfidenceClass>,
}

impl FireDetection {
    pub fn new(position: GeoPoint, frp: Megawatts, acquired_at: Option<DateTime<Utc>>) -> Self {
        FireDetection {
            position,
            frp,
            acquired_at,
            confidence: None,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: ConfidenceClass) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Aggregate of spatially connected detections
///
/// Created fresh per scoring call and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FireCluster {
    /// Arithmetic mean of member latitudes/longitudes
    pub centroid: GeoPoint,
    /// Sum of member FRP
    pub total_frp: Megawatts,
    /// Number of member detections
    pub size: usize,
}

impl FireCluster {
    /// Cluster holding exactly one detection
    pub fn singleton(detection: &FireDetection) -> Self {
        FireCluster {
            centroid: detection.position,
            total_frp: detection.frp,
            size: 1,
        }
    }

    /// Aggregate the given member detections. Returns `None` for an empty set.
    pub fn from_members<'a, I>(members: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a FireDetection>,
    {
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let mut total_frp = Megawatts::ZERO;
        let mut size = 0usize;

        for d in members {
            lat_sum += d.position.latitude;
            lon_sum += d.position.longitude;
            total_frp = total_frp + d.frp;
            size += 1;
        }

        if size == 0 {
            return None;
        }

        let n = size as f64;
        Some(FireCluster {
            centroid: GeoPoint::new(lat_sum / n, lon_sum / n),
            total_frp,
            size,
        })
    }
}
