//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt::Write as _;
use std::path::Path;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Grid point used by the synthetic weather file
pub const GRID_POINT: (f64, f64) = (1.0, 103.0);

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap()
}

pub fn at(hour: i64) -> DateTime<Utc> {
    base_time() + Duration::hours(hour)
}

fn stamp(hour: i64) -> String {
    at(hour).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Write `fires.csv`, `weather.csv` and `psi.csv` into `dir`
///
/// - fires: one 100 MW hotspot at the grid point at hours -2 and 20
/// - weather: hourly 15 km/h south-westerly at the grid point, hours 0..=200
/// - psi: wide regional table, hourly from 0 to `psi_last_hour` inclusive;
///   every region reads `50 + hour % 7`, so the national mean is the same
pub fn write_dataset(dir: &Path, psi_last_hour: i64) {
    let mut fires = String::from("latitude,longitude,frp,acq_date,acq_time,confidence\n");
    for h in [-2, 20] {
        let t = at(h);
        writeln!(
            fires,
            "{},{},100.0,{},{},h",
            GRID_POINT.0,
            GRID_POINT.1,
            t.format("%Y-%m-%d"),
            t.format("%H%M")
        )
        .unwrap();
    }

    let mut weather = String::from("timestamp,grid_lat,grid_lon,wind_speed_10m,wind_direction_10m\n");
    for h in 0..=200 {
        writeln!(weather, "{},{},{},15.0,225.0", stamp(h), GRID_POINT.0, GRID_POINT.1).unwrap();
    }

    let mut psi = String::from("timestamp,north,south,east,west,central\n");
    for h in 0..=psi_last_hour {
        let v = 50 + h % 7;
        writeln!(psi, "{},{v},{v},{v},{v},{v}", stamp(h)).unwrap();
    }

    std::fs::write(dir.join("fires.csv"), fires).unwrap();
    std::fs::write(dir.join("weather.csv"), weather).unwrap();
    std::fs::write(dir.join("psi.csv"), psi).unwrap();
}
