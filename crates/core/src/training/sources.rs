//! CSV loaders for the three historical inputs
//!
//! - fires: FIRMS hotspot exports (`latitude, longitude, frp, acq_date,
//!   acq_time[, confidence]`, `acq_time` as `HHMM`)
//! - weather: gridded hourly wind (`timestamp, grid_lat, grid_lon,
//!   wind_speed_10m, wind_direction_10m`)
//! - psi: either wide (`timestamp, north, south, east, west, central[,
//!   national]`) or long (`timestamp, region, psi_24h`)
//!
//! Malformed rows are skipped and counted; I/O failures abort the load.

use crate::core_types::fire::{ConfidenceClass, FireDetection};
use crate::core_types::geo::GeoPoint;
use crate::core_types::psi::{PsiReading, PsiTable, Region};
use crate::core_types::units::{Degrees, KilometersPerHour, Megawatts};
use crate::core_types::wind::{TimedWind, WindSample};
use crate::training::error::{BuildError, Result};
use crate::training::tables::{HistoricalTables, WeatherGrid};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Unit of the wind speed column in weather files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WindSpeedUnit {
    #[default]
    #[serde(rename = "kmh")]
    KilometersPerHour,
    /// ERA5 10 m wind is reported in m/s
    #[serde(rename = "mps")]
    MetersPerSecond,
}

impl WindSpeedUnit {
    pub fn to_speed(self, raw: f64) -> KilometersPerHour {
        match self {
            WindSpeedUnit::KilometersPerHour => KilometersPerHour::new(raw),
            WindSpeedUnit::MetersPerSecond => KilometersPerHour::from_mps(raw),
        }
    }
}

impl FromStr for WindSpeedUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmh" | "km/h" => Ok(WindSpeedUnit::KilometersPerHour),
            "mps" | "m/s" => Ok(WindSpeedUnit::MetersPerSecond),
            other => Err(format!("unknown wind speed unit '{other}' (expected kmh or mps)")),
        }
    }
}

/// Parse the timestamp spellings found in the input files. Naive times are
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// FIRMS acquisition time from `acq_date` (`YYYY-MM-DD`) and `acq_time`
/// (`HHMM`, leading zeros optional). Without `acq_time` the date field may
/// carry a full timestamp.
fn acquisition_time(date: Option<&str>, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date?.trim();
    match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let hhmm: u32 = t.parse().ok()?;
            let clock = NaiveTime::from_hms_opt(hhmm / 100, hhmm % 100, 0)?;
            Some(day.and_time(clock).and_utc())
        }
        None => parse_timestamp(date),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(reader)
}

fn open(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(BuildError::MissingSource(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

// raw FIRMS hotspot, extra columns ignored
#[derive(Debug, Deserialize)]
struct RawFire {
    latitude: f64,
    longitude: f64,
    frp: f64,
    #[serde(default)]
    acq_date: Option<String>,
    #[serde(default)]
    acq_time: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Load fire detections. Rows with invalid coordinates or FRP are skipped;
/// unparseable acquisition times load as `None`.
pub fn read_fires<R: Read>(reader: R) -> Result<Vec<FireDetection>> {
    let mut rdr = csv_reader(reader);
    let mut fires = Vec::new();
    let mut skipped = 0usize;
    let mut undated = 0usize;

    for result in rdr.deserialize::<RawFire>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let position = GeoPoint::new(raw.latitude, raw.longitude);
        if !position.is_finite() || !raw.frp.is_finite() || raw.frp < 0.0 {
            skipped += 1;
            continue;
        }

        let acquired_at = acquisition_time(raw.acq_date.as_deref(), raw.acq_time.as_deref());
        if acquired_at.is_none() {
            undated += 1;
        }

        let mut detection = FireDetection::new(position, Megawatts::new(raw.frp), acquired_at);
        if let Some(c) = raw.confidence.as_deref().and_then(ConfidenceClass::parse) {
            detection = detection.with_confidence(c);
        }
        fires.push(detection);
    }

    if skipped > 0 || undated > 0 {
        tracing::warn!(skipped, undated, loaded = fires.len(), "fire rows with problems");
    }
    Ok(fires)
}

#[derive(Debug, Deserialize)]
struct RawWind {
    timestamp: String,
    grid_lat: f64,
    grid_lon: f64,
    #[serde(alias = "wind_speed")]
    wind_speed_10m: f64,
    #[serde(alias = "wind_direction")]
    wind_direction_10m: f64,
}

/// Load gridded hourly wind
pub fn read_weather<R: Read>(reader: R, unit: WindSpeedUnit) -> Result<WeatherGrid> {
    let mut rdr = csv_reader(reader);
    let mut observations = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize::<RawWind>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let point = GeoPoint::new(raw.grid_lat, raw.grid_lon);
        let valid = point.is_finite()
            && raw.wind_speed_10m.is_finite()
            && raw.wind_speed_10m >= 0.0
            && raw.wind_direction_10m.is_finite();
        let Some(timestamp) = parse_timestamp(&raw.timestamp).filter(|_| valid) else {
            skipped += 1;
            continue;
        };

        let sample = WindSample::new(
            unit.to_speed(raw.wind_speed_10m),
            Degrees::new(raw.wind_direction_10m).normalized(),
        );
        observations.push((point, TimedWind { timestamp, sample }));
    }

    if skipped > 0 {
        tracing::warn!(skipped, loaded = observations.len(), "skipped malformed weather rows");
    }
    Ok(WeatherGrid::from_observations(observations))
}

/// Load PSI readings in wide or long layout
pub fn read_psi<R: Read>(reader: R) -> Result<PsiTable> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let time_col = column("timestamp").ok_or_else(|| BuildError::InvalidData {
        source_name: "psi",
        message: "no timestamp column".to_string(),
    })?;

    let readings = match column("region") {
        Some(region_col) => {
            let value_col = column("psi_24h")
                .or_else(|| column("psi"))
                .or_else(|| column("value"))
                .ok_or_else(|| BuildError::InvalidData {
                    source_name: "psi",
                    message: "long layout needs a psi_24h, psi or value column".to_string(),
                })?;
            read_long_psi(&mut rdr, time_col, region_col, value_col)?
        }
        None => {
            let regions: Vec<(usize, Region)> = headers
                .iter()
                .enumerate()
                .filter_map(|(i, h)| h.parse::<Region>().ok().map(|r| (i, r)))
                .collect();
            if regions.is_empty() {
                return Err(BuildError::InvalidData {
                    source_name: "psi",
                    message: "no region columns".to_string(),
                });
            }
            read_wide_psi(&mut rdr, time_col, &regions)?
        }
    };

    Ok(PsiTable::from_readings(readings))
}

fn field_f64(record: &StringRecord, col: usize) -> Option<f64> {
    record.get(col)?.parse().ok()
}

fn read_wide_psi<R: Read>(rdr: &mut csv::Reader<R>, time_col: usize, regions: &[(usize, Region)]) -> Result<Vec<PsiReading>> {
    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for record in rdr.records() {
        let record = record?;
        let Some(timestamp) = record.get(time_col).and_then(parse_timestamp) else {
            skipped += 1;
            continue;
        };
        for &(col, region) in regions {
            // empty cells are normal for missing regions
            if let Some(value) = field_f64(&record, col) {
                readings.push(PsiReading::new(timestamp, region, value));
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped PSI rows with unparseable timestamps");
    }
    Ok(readings)
}

fn read_long_psi<R: Read>(
    rdr: &mut csv::Reader<R>,
    time_col: usize,
    region_col: usize,
    value_col: usize,
) -> Result<Vec<PsiReading>> {
    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for record in rdr.records() {
        let record = record?;
        let timestamp = record.get(time_col).and_then(parse_timestamp);
        let region = record.get(region_col).and_then(|r| r.parse::<Region>().ok());
        let value = field_f64(&record, value_col);
        match (timestamp, region, value) {
            (Some(t), Some(r), Some(v)) => readings.push(PsiReading::new(t, r, v)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped malformed PSI rows");
    }
    Ok(readings)
}

/// Paths of the three historical inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSources {
    pub fires: PathBuf,
    pub weather: PathBuf,
    pub psi: PathBuf,
    pub wind_unit: WindSpeedUnit,
}

impl DataSources {
    /// `fires.csv`, `weather.csv` and `psi.csv` inside `dir`
    pub fn from_dir(dir: &Path) -> Self {
        DataSources {
            fires: dir.join("fires.csv"),
            weather: dir.join("weather.csv"),
            psi: dir.join("psi.csv"),
            wind_unit: WindSpeedUnit::default(),
        }
    }

    #[must_use]
    pub fn with_wind_unit(mut self, unit: WindSpeedUnit) -> Self {
        self.wind_unit = unit;
        self
    }

    /// Parse all three files into fresh tables (bypasses the table cache)
    pub fn load(&self) -> Result<HistoricalTables> {
        let fires = read_fires(open(&self.fires)?)?;
        let weather = read_weather(open(&self.weather)?, self.wind_unit)?;
        let psi = read_psi(open(&self.psi)?)?;

        if psi.is_empty() {
            return Err(BuildError::InvalidData {
                source_name: "psi",
                message: format!("{} holds no readings", self.psi.display()),
            });
        }
        if weather.is_empty() {
            return Err(BuildError::InvalidData {
                source_name: "weather",
                message: format!("{} holds no grid points", self.weather.display()),
            });
        }

        tracing::info!(
            fires = fires.len(),
            grid_points = weather.len(),
            psi_timestamps = psi.national().len(),
            psi_from = ?psi.national().first_timestamp(),
            psi_to = ?psi.national().last_timestamp(),
            "loaded historical data"
        );
        Ok(HistoricalTables::new(fires, weather, psi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2019, 9, 15, 6, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2019-09-15T06:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-09-15T14:00:00+08:00"), Some(expected));
        assert_eq!(parse_timestamp("2019-09-15 06:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2019-09-15 06:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2019-09-15"),
            Some(Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_read_firms_rows() {
        let data = "\
latitude,longitude,bright_ti4,frp,acq_date,acq_time,confidence
0.5,101.5,330.1,12.5,2019-09-15,0542,n
-1.2,103.1,301.0,4.0,2019-09-15,5,h
1.0,102.0,300.0,-3.0,2019-09-15,0600,l
abc,102.0,300.0,3.0,2019-09-15,0600,l
0.7,101.9,320.0,8.0,not-a-date,0600,85
";
        let fires = read_fires(data.as_bytes()).unwrap();
        assert_eq!(fires.len(), 3);
        assert_eq!(fires[0].acquired_at, Some(Utc.with_ymd_and_hms(2019, 9, 15, 5, 42, 0).unwrap()));
        assert_eq!(fires[0].confidence, Some(ConfidenceClass::Nominal));
        assert_eq!(fires[1].acquired_at, Some(Utc.with_ymd_and_hms(2019, 9, 15, 0, 5, 0).unwrap()));
        assert_eq!(fires[2].acquired_at, None);
        assert_eq!(fires[2].confidence, Some(ConfidenceClass::High));
    }

    #[test]
    fn test_read_weather_converts_units() {
        let data = "\
timestamp,grid_lat,grid_lon,wind_speed_10m,wind_direction_10m
2019-09-15 00:00:00,0.0,100.0,10.0,-90
2019-09-15 01:00:00,0.0,100.0,5.0,180
bad,0.0,100.0,5.0,180
";
        let grid = read_weather(data.as_bytes(), WindSpeedUnit::MetersPerSecond).unwrap();
        assert_eq!(grid.len(), 1);
        let t0 = Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap();
        let run = grid.hourly_from(0, t0, t0 + chrono::Duration::hours(24));
        assert_eq!(run.len(), 2);
        assert!((*run[0].speed - 36.0).abs() < 1e-9);
        assert_eq!(*run[0].direction, 270.0);
    }

    #[test]
    fn test_read_wide_psi_synthesizes_national() {
        let data = "\
timestamp,north,south,east,west,central
2019-09-15 00:00:00,50,60,70,80,90
2019-09-15 01:00:00,,60,,,
";
        let table = read_psi(data.as_bytes()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap();
        assert_eq!(table.national().at(t0), Some(70.0));
        assert_eq!(table.national().at(t0 + chrono::Duration::hours(1)), Some(60.0));
        assert_eq!(table.region(Region::North).map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_read_long_psi() {
        let data = "\
timestamp,region,psi_24h
2019-09-15 00:00:00,national,55
2019-09-15 00:00:00,north,40
2019-09-15 01:00:00,atlantis,1
";
        let table = read_psi(data.as_bytes()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2019, 9, 15, 0, 0, 0).unwrap();
        assert_eq!(table.national().at(t0), Some(55.0));
    }

    #[test]
    fn test_missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataSources::from_dir(dir.path()).load().unwrap_err();
        assert!(matches!(err, BuildError::MissingSource(_)));
    }
}
