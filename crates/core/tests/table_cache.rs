//! Process-global historical table cache
mod common;

use haze_core::training::{clear_table_cache, load_cached, DataSources, WindSpeedUnit};
use std::sync::Arc;

#[test]
fn test_tables_shared_until_cleared() {
    let dir = tempfile::tempdir().unwrap();
    common::write_dataset(dir.path(), 250);
    let sources = DataSources::from_dir(dir.path());

    let first = load_cached(&sources).unwrap();
    let second = load_cached(&sources).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.fire_count(), 2);
    assert_eq!(first.weather().len(), 1);

    // a different unit is a different source set
    let mps = load_cached(&sources.clone().with_wind_unit(WindSpeedUnit::MetersPerSecond)).unwrap();
    assert!(!Arc::ptr_eq(&first, &mps));

    clear_table_cache();
    let reloaded = load_cached(&sources).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(reloaded.psi().national().len(), first.psi().national().len());
}
