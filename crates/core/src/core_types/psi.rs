//! Pollutant Standards Index readings and per-region time series

use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// NEA reporting region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    North,
    South,
    East,
    West,
    Central,
    /// Cross-region mean, synthesized when the feed does not supply it
    National,
}

impl Region {
    /// The five reporting regions the national value is averaged from
    pub const REGIONAL: [Region; 5] = [
        Region::North,
        Region::South,
        Region::East,
        Region::West,
        Region::Central,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::North => "north",
            Region::South => "south",
            Region::East => "east",
            Region::West => "west",
            Region::Central => "central",
            Region::National => "national",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Region::North),
            "south" => Ok(Region::South),
            "east" => Ok(Region::East),
            "west" => Ok(Region::West),
            "central" => Ok(Region::Central),
            "national" => Ok(Region::National),
            other => Err(format!("unknown PSI region '{other}'")),
        }
    }
}

/// One PSI value at one time in one region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsiReading {
    pub timestamp: DateTime<Utc>,
    pub region: Region,
    pub value: f64,
}

impl PsiReading {
    pub fn new(timestamp: DateTime<Utc>, region: Region, value: f64) -> Self {
        PsiReading {
            timestamp,
            region,
            value,
        }
    }
}

/// Time-ordered PSI values for a single region
///
/// Timestamps are unique and strictly ascending, which every lookup relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsiSeries {
    points: Vec<(DateTime<Utc>, f64)>,
}

impl PsiSeries {
    /// Build a series from unordered points. Non-finite values are dropped;
    /// for duplicate timestamps the first occurrence wins.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        let mut points: Vec<_> = points.into_iter().filter(|(_, v)| v.is_finite()).collect();
        points.sort_by_key(|(t, _)| *t);
        points.dedup_by_key(|(t, _)| *t);
        PsiSeries { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|(t, _)| *t)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|(t, _)| *t)
    }

    /// Iterate `(timestamp, value)` in ascending time order
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.points.iter().copied()
    }

    /// Timestamps within `[start, end)` in ascending order
    pub fn timestamps_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let lo = self.points.partition_point(|(t, _)| *t < start);
        let hi = self.points.partition_point(|(t, _)| *t < end);
        self.points[lo..hi.max(lo)].iter().map(|(t, _)| *t)
    }

    /// Value recorded exactly at `timestamp`
    pub fn at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |(t, _)| *t)
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Reading closest in time to `target` and its absolute offset.
    /// On an exact tie the earlier reading wins.
    pub fn nearest(&self, target: DateTime<Utc>) -> Option<(DateTime<Utc>, f64, Duration)> {
        let idx = self.points.partition_point(|(t, _)| *t < target);

        let before = idx.checked_sub(1).map(|i| self.points[i]);
        let after = self.points.get(idx).copied();

        let pick = match (before, after) {
            (Some(b), Some(a)) => {
                if target - b.0 <= a.0 - target {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        let offset = pick.0 - target;
        let offset = if offset < Duration::zero() { -offset } else { offset };
        Some((pick.0, pick.1, offset))
    }

    /// Closest reading to `target`, accepted only if within `tolerance`
    pub fn nearest_within(&self, target: DateTime<Utc>, tolerance: Duration) -> Option<f64> {
        self.nearest(target)
            .filter(|(_, _, offset)| *offset <= tolerance)
            .map(|(_, value, _)| value)
    }
}

/// PSI series for every region, national always present when any data is
#[derive(Debug, Clone, Default)]
pub struct PsiTable {
    series: FxHashMap<Region, PsiSeries>,
}

impl PsiTable {
    /// Group readings by region. If no national readings were supplied, the
    /// national series is synthesized as the per-timestamp mean of the
    /// regional values.
    pub fn from_readings<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = PsiReading>,
    {
        let mut grouped: FxHashMap<Region, Vec<(DateTime<Utc>, f64)>> = FxHashMap::default();
        for r in readings {
            grouped.entry(r.region).or_default().push((r.timestamp, r.value));
        }

        let national_supplied = grouped
            .get(&Region::National)
            .is_some_and(|v| !v.is_empty());

        if !national_supplied {
            let mut sums: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
            // fixed region order keeps the float sums reproducible
            for points in Region::REGIONAL.iter().filter_map(|r| grouped.get(r)) {
                for (t, v) in points.iter().filter(|(_, v)| v.is_finite()) {
                    let entry = sums.entry(*t).or_insert((0.0, 0));
                    entry.0 += v;
                    entry.1 += 1;
                }
            }
            if !sums.is_empty() {
                tracing::debug!(timestamps = sums.len(), "synthesizing national PSI from regional mean");
                let national = sums
                    .into_iter()
                    .map(|(t, (sum, n))| (t, sum / n as f64))
                    .collect();
                grouped.insert(Region::National, national);
            }
        }

        let series = grouped
            .into_iter()
            .map(|(region, points)| (region, PsiSeries::from_points(points)))
            .collect();

        PsiTable { series }
    }

    pub fn region(&self, region: Region) -> Option<&PsiSeries> {
        self.series.get(&region)
    }

    /// The national series (empty if the table holds no data)
    pub fn national(&self) -> &PsiSeries {
        static EMPTY: PsiSeries = PsiSeries { points: Vec::new() };
        self.series.get(&Region::National).unwrap_or(&EMPTY)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(PsiSeries::is_empty)
    }
}
