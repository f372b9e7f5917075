//! Integration test: object fetch and train/test split

use booking_pipeline::config::{ArtifactPaths, PipelineConfig};
use booking_pipeline::ingestion::{DataIngestion, GcsObjectStore, LocalObjectStore};
use booking_pipeline::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tempfile::tempdir;

fn config_for(root: &Path, ratio: f64) -> PipelineConfig {
    let yaml = format!(
        r#"
data_ingestion:
  bucket_name: bookings
  bucket_file_name: raw.csv
  train_ratio: {ratio}
  random_state: 7
  storage:
    backend: local
    root: {root}
data_processing:
  categorical_columns: [booking_status]
  numerical_columns: [lead_time]
  skewness_threshold: 5
  no_of_features: 1
"#,
        ratio = ratio,
        root = root.join("store").display()
    );
    PipelineConfig::from_yaml_str(&yaml)
        .unwrap()
        .with_paths(ArtifactPaths::under(root.join("artifacts")))
}

fn seed_bucket(root: &Path, rows: i64) {
    let mut df = df! {
        "Booking_ID" => (0..rows).map(|i| format!("INN{:05}", i)).collect::<Vec<_>>(),
        "lead_time" => (0..rows).map(|i| (i * 13) % 97).collect::<Vec<i64>>(),
        "booking_status" => (0..rows).map(|i| if i % 3 == 0 { "Canceled" } else { "Not_Canceled" }).collect::<Vec<_>>(),
    }
    .unwrap();
    DataSaver::save_csv(&mut df, root.join("store").join("bookings").join("raw.csv")).unwrap();
}

fn booking_ids(path: &Path) -> Vec<String> {
    let df = DataLoader::new().load_csv(path).unwrap();
    df.column("Booking_ID")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_run_writes_disjoint_split() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path(), 250);
    let config = config_for(dir.path(), 0.8);

    let (n_train, n_test) = DataIngestion::new(&config).unwrap().run().unwrap();
    assert_eq!((n_train, n_test), (200, 50));

    let train: HashSet<String> = booking_ids(&config.paths.train_file).into_iter().collect();
    let test: HashSet<String> = booking_ids(&config.paths.test_file).into_iter().collect();
    assert_eq!(train.len(), 200);
    assert_eq!(test.len(), 50);
    assert!(train.is_disjoint(&test));

    // no index column is added
    let header = DataLoader::new().load_csv(&config.paths.train_file).unwrap();
    assert_eq!(header.width(), 3);
}

#[test]
fn test_rerun_is_reproducible() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path(), 120);
    let config = config_for(dir.path(), 0.75);
    let ingestion = DataIngestion::new(&config).unwrap();

    ingestion.run().unwrap();
    let first = booking_ids(&config.paths.train_file);
    ingestion.run().unwrap();
    let second = booking_ids(&config.paths.train_file);

    assert_eq!(first, second);
}

#[test]
fn test_explicit_store() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path(), 40);
    let config = config_for(dir.path(), 0.5);

    let store = LocalObjectStore::new(dir.path().join("store"));
    let ingestion = DataIngestion::with_store(&config, Box::new(store)).unwrap();
    let raw = ingestion.fetch().unwrap();

    assert_eq!(raw, config.paths.raw_file);
    assert_eq!(ingestion.split(0.5).unwrap(), (20, 20));
}

#[test]
fn test_missing_object_is_ingestion_error() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path(), 0.8);

    let err = DataIngestion::new(&config).unwrap().run().unwrap_err();
    assert!(err.is_ingestion());
    assert!(!config.paths.train_file.exists());
}

#[test]
fn test_header_only_raw_file_is_ingestion_error() {
    let dir = tempdir().unwrap();
    let bucket = dir.path().join("store").join("bookings");
    std::fs::create_dir_all(&bucket).unwrap();
    std::fs::write(bucket.join("raw.csv"), "Booking_ID,lead_time,booking_status\n").unwrap();

    let config = config_for(dir.path(), 0.8);
    let err = DataIngestion::new(&config).unwrap().run().unwrap_err();
    assert!(err.is_ingestion());
}

#[test]
fn test_split_with_empty_side_is_ingestion_error() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path(), 3);
    let config = config_for(dir.path(), 0.8);

    let ingestion = DataIngestion::new(&config).unwrap();
    ingestion.fetch().unwrap();
    assert!(ingestion.split(0.2).unwrap_err().is_ingestion());
    assert!(ingestion.split(1.0).unwrap_err().is_ingestion());
}

#[test]
fn test_unreachable_gcs_endpoint_is_ingestion_error() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path(), 0.8);

    let store = GcsObjectStore::with_endpoint("http://127.0.0.1:9/").unwrap().with_token("test-token");
    let ingestion = DataIngestion::with_store(&config, Box::new(store)).unwrap();

    let err = ingestion.fetch().unwrap_err();
    assert!(err.is_ingestion());
    assert!(!config.paths.raw_file.exists());
}
