//! Integration test: preprocessing stage over split files

use booking_pipeline::config::{ArtifactPaths, PipelineConfig};
use booking_pipeline::preprocessing::{sample_skewness, DataProcessor};
use booking_pipeline::utils::frame::column_f64;
use booking_pipeline::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const CONFIG: &str = r#"
data_ingestion:
  bucket_name: bookings
  bucket_file_name: raw.csv
  train_ratio: 0.8
data_processing:
  drop_columns: [Booking_ID]
  categorical_columns: [room_type_reserved, booking_status]
  numerical_columns: [lead_time, avg_price_per_room]
  skewness_threshold: 1.0
  no_of_features: 2
  selector_n_estimators: 10
"#;

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::from_yaml_str(CONFIG)
        .unwrap()
        .with_paths(ArtifactPaths::under(root))
}

fn bookings(n: usize, offset: usize) -> DataFrame {
    let rooms = ["Room_Type 1", "Room_Type 2", "Room_Type 4"];
    df! {
        "Booking_ID" => (0..n).map(|i| format!("INN{:05}", i + offset)).collect::<Vec<_>>(),
        "room_type_reserved" => (0..n).map(|i| rooms[i % 3]).collect::<Vec<_>>(),
        "lead_time" => (0..n).map(|i| if i % 10 == 0 { 400.0 + i as f64 } else { (i % 17) as f64 }).collect::<Vec<f64>>(),
        "avg_price_per_room" => (0..n).map(|i| 80.0 + (i % 23) as f64).collect::<Vec<f64>>(),
        "booking_status" => (0..n).map(|i| if i % 4 == 0 { "Canceled" } else { "Not_Canceled" }).collect::<Vec<_>>(),
    }
    .unwrap()
}

fn write_split(paths: &ArtifactPaths, mut train: DataFrame, mut test: DataFrame) {
    DataSaver::save_csv(&mut train, &paths.train_file).unwrap();
    DataSaver::save_csv(&mut test, &paths.test_file).unwrap();
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_process_writes_aligned_files() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    write_split(&config.paths, bookings(160, 0), bookings(40, 1000));

    let summary = DataProcessor::new(&config).process().unwrap();

    let loader = DataLoader::new();
    let train = loader.load_csv(&config.paths.processed_train_file).unwrap();
    let test = loader.load_csv(&config.paths.processed_test_file).unwrap();

    assert_eq!(train.width(), 3);
    assert_eq!(names(&train), names(&test));
    assert_eq!(summary.selected_features.len(), 2);
    assert_eq!(summary.train_shape, train.shape());
    assert_eq!(summary.test_shape, test.shape());

    // balanced: 120 "Not_Canceled" rows in train, so 240 after oversampling
    assert_eq!(train.height(), 240);
    let labels = column_f64(&train, "booking_status").unwrap();
    assert_eq!(labels.iter().filter(|&&v| v == 0.0).count(), 120);

    // test is never resampled
    assert_eq!(test.height(), 40);
}

#[test]
fn test_test_set_uses_train_mapping() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.data_processing.no_of_features = 3;

    // test only holds "Room_Type 4", which is code 2 in train
    let full = bookings(40, 1000);
    let mask = full
        .column("room_type_reserved")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .equal("Room_Type 4");
    let test = full.filter(&mask).unwrap();
    write_split(&config.paths, bookings(160, 0), test);

    DataProcessor::new(&config).process().unwrap();
    let processed = DataLoader::new().load_csv(&config.paths.processed_test_file).unwrap();
    let codes = column_f64(&processed, "room_type_reserved").unwrap();
    assert!(!codes.is_empty());
    assert!(codes.iter().all(|&c| c == 2.0));
}

#[test]
fn test_skewed_column_is_less_skewed_after_processing() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.data_processing.no_of_features = 3;
    let train = bookings(160, 0);
    write_split(&config.paths, train.clone(), bookings(40, 1000));

    DataProcessor::new(&config).process().unwrap();
    let processed = DataLoader::new().load_csv(&config.paths.processed_test_file).unwrap();

    let before = sample_skewness(&column_f64(&bookings(40, 1000), "lead_time").unwrap());
    let after = sample_skewness(&column_f64(&processed, "lead_time").unwrap());
    assert!(after.abs() < before.abs());
}

#[test]
fn test_unseen_target_label_fails() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut test = bookings(10, 1000);
    test.with_column(Series::new("booking_status".into(), vec!["Pending"; 10])).unwrap();
    write_split(&config.paths, bookings(160, 0), test);

    let err = DataProcessor::new(&config).process().unwrap_err();
    assert!(err.is_preprocessing());
    assert!(!config.paths.processed_train_file.exists());
}

#[test]
fn test_missing_configured_column_is_config_cause() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let train = bookings(160, 0).drop("Booking_ID").unwrap();
    write_split(&config.paths, train, bookings(40, 1000));

    let err = DataProcessor::new(&config).process().unwrap_err();
    assert!(err.is_preprocessing());
    assert!(err.caused_by_config());
}

#[test]
fn test_missing_split_file_fails() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let err = DataProcessor::new(&config).process().unwrap_err();
    assert!(err.is_preprocessing());
}

#[test]
fn test_numeric_target_without_categorical_columns() {
    let config = PipelineConfig::from_yaml_str(
        r#"
data_ingestion:
  bucket_name: bookings
  bucket_file_name: raw.csv
  train_ratio: 0.8
data_processing:
  categorical_columns: []
  numerical_columns: [lead_time, avg_price_per_room]
  skewness_threshold: 1.0
  no_of_features: 2
  selector_n_estimators: 10
"#,
    )
    .unwrap();
    let frame = |n: usize| {
        df! {
            "lead_time" => (0..n).map(|i| (i % 17) as f64 + if i % 4 == 0 { 30.0 } else { 0.0 }).collect::<Vec<f64>>(),
            "avg_price_per_room" => (0..n).map(|i| 80.0 + (i % 23) as f64).collect::<Vec<f64>>(),
            "booking_status" => (0..n).map(|i| if i % 4 == 0 { 0i64 } else { 1 }).collect::<Vec<i64>>(),
        }
        .unwrap()
    };

    let (train, test, selected) = DataProcessor::new(&config).process_frames(&frame(160), &frame(40)).unwrap();

    assert_eq!(selected.len(), 2);
    assert_eq!(names(&train), names(&test));
    assert_eq!(train.height(), 240);
    assert_eq!(test.height(), 40);
    assert_eq!(column_f64(&test, "booking_status").unwrap(), column_f64(&frame(40), "booking_status").unwrap());
}
