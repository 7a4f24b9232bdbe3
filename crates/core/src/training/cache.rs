//! Content-addressed cache of built training tables
//!
//! The file name is the SHA-256 of the canonical request key
//! `start_date|end_date|sample_interval_hours`, so the same request always
//! maps to the same file. Tables are written sorted by timestamp through a
//! temporary file and a rename; a reader never sees a half-written table.

use crate::training::builder::BuildRequest;
use crate::training::error::Result;
use crate::training::{TrainingRecord, TrainingTable};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "training_";
const FILE_SUFFIX: &str = ".csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCache {
    dir: PathBuf,
}

impl RecordCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        RecordCache { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of the canonical request key
    pub fn key(request: &BuildRequest) -> String {
        let canonical = format!(
            "{}|{}|{}",
            request.start_date.format("%Y-%m-%d"),
            request.end_date.format("%Y-%m-%d"),
            request.sample_interval_hours
        );
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }

    pub fn path_for(&self, request: &BuildRequest) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", Self::key(request)))
    }

    /// The cached table for `request`, or `None` if nothing is stored
    pub fn load(&self, request: &BuildRequest) -> Result<Option<TrainingTable>> {
        let path = self.path_for(request);
        let mut rdr = match csv::Reader::from_path(&path) {
            Ok(rdr) => rdr,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind() {
                    if io.kind() == ErrorKind::NotFound {
                        return Ok(None);
                    }
                }
                return Err(e.into());
            }
        };

        let records = rdr.deserialize::<TrainingRecord>().collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::info!(records = records.len(), path = %path.display(), "loaded cached training table");
        Ok(Some(TrainingTable::from_records(records)))
    }

    /// Write `table` for `request`, replacing any previous file
    pub fn store(&self, request: &BuildRequest, table: &TrainingTable) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(request);

        let mut wtr = csv::Writer::from_writer(Vec::new());
        for record in table.records() {
            wtr.serialize(record)?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

        let tmp = self.dir.join(format!(".{}.{}.tmp", Self::key(request), std::process::id()));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        tracing::info!(
            records = table.len(),
            bytes = bytes.len(),
            path = %path.display(),
            "cached training table"
        );
        Ok(path)
    }

    /// Delete every cached table; returns how many files were removed
    pub fn clear(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        tracing::info!(removed, dir = %self.dir.display(), "cleared training cache");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn request(interval: u32) -> BuildRequest {
        BuildRequest::new(
            NaiveDate::from_ymd_opt(2019, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 9, 30).unwrap(),
            interval,
        )
        .unwrap()
    }

    fn table() -> TrainingTable {
        let fv = FeatureVector {
            fire_risk_score: 4.337,
            wind_transport_score: 0.1,
            baseline_score: 11.0,
        };
        TrainingTable::from_records(vec![
            TrainingRecord::new(Utc.with_ymd_and_hms(2019, 9, 2, 0, 0, 0).unwrap(), fv, [1.0, 2.0, 3.0, 4.0]),
            TrainingRecord::new(Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap(), fv, [5.5, 6.5, 7.5, 8.5]),
        ])
    }

    #[test]
    fn test_key_depends_on_every_parameter() {
        let a = RecordCache::key(&request(24));
        assert_eq!(a.len(), 64);
        assert_eq!(a, RecordCache::key(&request(24)));
        assert_ne!(a, RecordCache::key(&request(12)));
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path().join("cache"));
        assert!(cache.load(&request(24)).unwrap().is_none());

        cache.store(&request(24), &table()).unwrap();
        let loaded = cache.load(&request(24)).unwrap().unwrap();
        assert_eq!(loaded, table());
        assert!(loaded.records()[0].timestamp < loaded.records()[1].timestamp);
    }

    #[test]
    fn test_store_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path());
        let path = cache.store(&request(24), &table()).unwrap();
        let first = fs::read(&path).unwrap();
        cache.store(&request(24), &table()).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());

        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with(
            "timestamp,fire_risk_score,wind_transport_score,baseline_score,actual_psi_24h,actual_psi_48h,actual_psi_72h,actual_psi_7d"
        ));
    }

    #[test]
    fn test_clear_removes_only_tables() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RecordCache::new(dir.path());
        cache.store(&request(24), &table()).unwrap();
        cache.store(&request(6), &table()).unwrap();
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(RecordCache::new(dir.path().join("missing")).clear().unwrap(), 0);
    }
}
