//! Integration test: ingestion -> preprocessing -> training from a local bucket

use booking_pipeline::config::{ArtifactPaths, PipelineConfig};
use booking_pipeline::export::ModelArtifact;
use booking_pipeline::pipeline::TrainingPipeline;
use booking_pipeline::training::{EvaluationMetrics, ModelTrainer};
use booking_pipeline::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use std::path::Path;
use tempfile::tempdir;

/// 1000 bookings; the last 300 (largest `num1`) are cancellations
fn hotel_frame() -> DataFrame {
    let n = 1000;
    let index: Vec<i64> = (0..n).collect();
    let id: Vec<String> = (0..n).map(|i| format!("INN{:05}", i)).collect();
    let cat1: Vec<&str> = (0..n).map(|i| ["Meal Plan 1", "Meal Plan 2", "Not Selected"][(i % 3) as usize]).collect();
    let num1: Vec<f64> = (0..n).map(|i| (i as f64 / 150.0).exp() - 1.0).collect();
    let status: Vec<&str> = (0..n)
        .map(|i| if i >= 700 { "Canceled" } else { "Not_Canceled" })
        .collect();

    df! {
        "index" => index,
        "id" => id,
        "cat1" => cat1,
        "num1" => num1,
        "booking_status" => status,
    }
    .unwrap()
}

fn config_for(root: &Path, object: &str) -> PipelineConfig {
    let yaml = format!(
        r#"
data_ingestion:
  bucket_name: bookings
  bucket_file_name: {object}
  train_ratio: 0.8
  storage:
    backend: local
    root: {root}
data_processing:
  drop_columns: [index, id]
  categorical_columns: [cat1, booking_status]
  numerical_columns: [num1]
  skewness_threshold: 1.0
  no_of_features: 2
  selector_n_estimators: 10
model_training:
  n_iter: 2
  cv: 2
  min_child_samples: 5
  space:
    n_estimators: {{ low: 10, high: 20 }}
    max_depth: {{ low: 3, high: 5 }}
    learning_rate: {{ low: 0.05, high: 0.2 }}
    num_leaves: {{ low: 4, high: 8 }}
"#,
        object = object,
        root = root.join("store").display()
    );
    PipelineConfig::from_yaml_str(&yaml)
        .unwrap()
        .with_paths(ArtifactPaths::under(root.join("artifacts")))
}

fn seed_bucket(root: &Path) {
    let mut df = hotel_frame();
    DataSaver::save_csv(&mut df, root.join("store").join("bookings").join("hotel.csv")).unwrap();
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_thousand_row_scenario() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path());
    let config = config_for(dir.path(), "hotel.csv");
    let paths = config.paths.clone();

    let metrics = TrainingPipeline::new(config.clone()).run().unwrap();

    for value in metrics.to_map().values() {
        assert!((0.0..=1.0).contains(value));
    }

    let loader = DataLoader::new();
    assert_eq!(loader.load_csv(&paths.train_file).unwrap().height(), 800);
    assert_eq!(loader.load_csv(&paths.test_file).unwrap().height(), 200);

    let train = loader.load_csv(&paths.processed_train_file).unwrap();
    let test = loader.load_csv(&paths.processed_test_file).unwrap();
    assert_eq!(train.width(), 3);
    assert_eq!(names(&train), names(&test));
    assert_eq!(names(&train).last().map(String::as_str), Some("booking_status"));
    assert!(!names(&train).contains(&"id".to_string()));
    assert_eq!(test.height(), 200);
    assert!(train.height() > 800);

    assert!(paths.model_output_path.exists());
    assert!(ModelArtifact::metadata_path(&paths.model_output_path).exists());
}

#[test]
fn test_persisted_model_reproduces_metrics() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path());
    let config = config_for(dir.path(), "hotel.csv");

    let metrics = TrainingPipeline::new(config.clone()).run().unwrap();

    let artifact = ModelArtifact::load(&config.paths.model_output_path).unwrap();
    let data = ModelTrainer::new(&config).load_and_split().unwrap();
    assert_eq!(artifact.feature_names(), data.feature_names.as_slice());

    let predicted = artifact.predict(&data.x_test).unwrap();
    let reloaded = EvaluationMetrics::compute(&data.y_test, &predicted).unwrap();
    assert_eq!(reloaded, metrics);
    assert_eq!(artifact.metadata.target_name, "booking_status");
    assert_eq!(artifact.metadata.metrics.get("accuracy"), Some(&metrics.accuracy));
}

#[test]
fn test_missing_object_halts_before_later_stages() {
    let dir = tempdir().unwrap();
    seed_bucket(dir.path());
    let config = config_for(dir.path(), "absent.csv");

    let err = TrainingPipeline::new(config.clone()).run().unwrap_err();

    assert!(err.is_ingestion());
    assert!(!config.paths.processed_train_file.exists());
    assert!(!config.paths.model_output_path.exists());
}
