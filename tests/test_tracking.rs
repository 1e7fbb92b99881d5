//! Integration test: file-backed tracking store layout

use insurance_modelling::error::ModellingError;
use insurance_modelling::tracking::{ExperimentTracker, RunStatus, TrackingConfig};
use insurance_modelling::training::RandomForest;
use ndarray::{array, Array2};
use std::fs;
use std::path::Path;

fn file_tracker(root: &Path) -> ExperimentTracker {
    let config = TrackingConfig::default()
        .with_tracking_uri(format!("file:{}", root.display()))
        .with_user("tester");
    ExperimentTracker::from_config(config).unwrap()
}

fn small_forest() -> RandomForest {
    let x = Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut model = RandomForest::new_regressor(3).with_max_depth(2).with_random_state(42);
    model.fit(&x, &y).unwrap();
    model
}

#[test]
fn test_store_directory_is_created_on_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("mlruns");
    let tracker = file_tracker(&root);
    assert!(!root.exists(), "resolving the store must not touch disk");

    let run = tracker.start_run().unwrap().finish().unwrap();
    assert!(root.join("0").join("meta.yaml").is_file());
    assert!(root.join("0").join(&run.run_id).join("meta.yaml").is_file());
}

#[test]
fn test_finished_run_layout() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(dir.path());

    let mut active = tracker.start_run().unwrap();
    active.log_param("test_size", "0.2").unwrap();
    active.log_param("n_estimators", "100").unwrap();
    active.log_param("max_depth", "5").unwrap();
    active.log_metric("r2_score", 0.75, 0).unwrap();
    active.log_model("model", "random_forest", &small_forest()).unwrap();
    let run = active.finish().unwrap();

    assert_eq!(run.run_id.len(), 32);
    assert!(run.run_id.chars().all(|c| c.is_ascii_hexdigit()));

    let run_dir = dir.path().join("0").join(&run.run_id);
    assert_eq!(fs::read_to_string(run_dir.join("params/n_estimators")).unwrap(), "100");
    assert_eq!(fs::read_to_string(run_dir.join("tags/mlflow.user")).unwrap(), "tester");

    let metric = fs::read_to_string(run_dir.join("metrics/r2_score")).unwrap();
    let fields: Vec<&str> = metric.split_whitespace().collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1], "0.75");
    assert_eq!(fields[2], "0");

    let mlmodel = fs::read_to_string(run_dir.join("artifacts/model/MLmodel")).unwrap();
    assert!(mlmodel.contains("artifact_path: model"));
    assert!(mlmodel.contains(&format!("run_id: {}", run.run_id)));

    let model_json = fs::read(run_dir.join("artifacts/model/model.json")).unwrap();
    let restored: RandomForest = serde_json::from_slice(&model_json).unwrap();
    assert_eq!(restored.n_trees(), 3);

    let meta = fs::read_to_string(run_dir.join("meta.yaml")).unwrap();
    assert!(meta.contains("status: 3"));

    let loaded = tracker.load_run("0", &run.run_id).unwrap();
    assert_eq!(loaded.status, RunStatus::Finished);
    assert_eq!(loaded.params.len(), 3);
    assert_eq!(loaded.metrics.get("r2_score"), Some(&0.75));
    assert!(loaded.artifacts.contains(&"model/model.json".to_string()));
}

#[test]
fn test_dropped_run_is_marked_failed() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(dir.path());

    let run_id = {
        let mut active = tracker.start_run().unwrap();
        active.log_param("n_estimators", "0").unwrap();
        active.run_id().to_string()
    };

    let loaded = tracker.load_run("0", &run_id).unwrap();
    assert_eq!(loaded.status, RunStatus::Failed);
    assert!(loaded.end_time.is_some());
}

#[test]
fn test_param_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(dir.path());
    let mut active = tracker.start_run().unwrap();

    active.log_param("max_depth", "5").unwrap();
    active.log_param("max_depth", "5").unwrap();
    let err = active.log_param("max_depth", "6").unwrap_err();
    assert!(matches!(err, ModellingError::ParamConflict { ref key, .. } if key == "max_depth"));

    active.finish().unwrap();
}

#[test]
fn test_named_experiment_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackingConfig::default()
        .with_tracking_uri(dir.path().display().to_string())
        .with_experiment_name("insurance");
    let tracker = ExperimentTracker::from_config(config).unwrap();

    let first = tracker.start_run().unwrap().finish().unwrap();
    let second = tracker.start_run().unwrap().finish().unwrap();

    assert_eq!(first.experiment_id, "1");
    assert_eq!(second.experiment_id, "1");
    assert_eq!(tracker.list_runs("1").unwrap().len(), 2);
}

#[test]
fn test_remote_tracking_uri_is_rejected() {
    let config = TrackingConfig::default().with_tracking_uri("http://localhost:5000");
    let err = ExperimentTracker::from_config(config).err().unwrap();
    assert!(matches!(err, ModellingError::ConfigError(_)));
}
