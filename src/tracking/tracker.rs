//! Experiment tracker and scoped run handle
//!
//! A run is opened with [`ExperimentTracker::start_run`] and lives exactly as
//! long as the returned [`ActiveRun`]. Dropping the handle without calling
//! [`ActiveRun::finish`] records the run as failed, so early returns via `?`
//! and panics never leave a run in the running state.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::TrackingConfig;
use super::storage::{LocalStorage, StorageBackend};
use crate::error::{ModellingError, Result};

/// Status of a run, with the numeric codes used by the file store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
    /// Run was killed/stopped
    Killed,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Running => 1,
            RunStatus::Finished => 3,
            RunStatus::Failed => 4,
            RunStatus::Killed => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(RunStatus::Running),
            3 => Some(RunStatus::Finished),
            4 => Some(RunStatus::Failed),
            5 => Some(RunStatus::Killed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

/// A single metric observation
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub key: String,
    pub value: f64,
    pub step: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Metric {
    pub fn new(key: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            key: key.into(),
            value,
            step,
            timestamp: now_millis(),
        }
    }
}

/// An experiment grouping runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub artifact_location: String,
    pub created_at: i64,
}

/// A run record as held by the tracker and stores
#[derive(Debug, Clone)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    /// Start time in epoch milliseconds
    pub start_time: i64,
    /// End time in epoch milliseconds (None while running)
    pub end_time: Option<i64>,
    pub status: RunStatus,
    pub params: HashMap<String, String>,
    /// Latest value per metric key
    pub metrics: HashMap<String, f64>,
    pub metrics_history: Vec<Metric>,
    pub tags: HashMap<String, String>,
    /// Artifact paths relative to the run's artifact root
    pub artifacts: Vec<String>,
    pub artifact_uri: String,
    pub user_id: String,
}

impl Run {
    /// Create a run in the running state
    pub fn new(experiment_id: impl Into<String>) -> Self {
        let run_id = Uuid::new_v4().simple().to_string();
        let run_name = format!("run-{}", &run_id[..8]);
        Self {
            run_id,
            run_name,
            experiment_id: experiment_id.into(),
            start_time: now_millis(),
            end_time: None,
            status: RunStatus::Running,
            params: HashMap::new(),
            metrics: HashMap::new(),
            metrics_history: Vec::new(),
            tags: HashMap::new(),
            artifacts: Vec::new(),
            artifact_uri: String::new(),
            user_id: "unknown".to_string(),
        }
    }

    /// Run duration in seconds, up to now if still running
    pub fn duration_secs(&self) -> f64 {
        let end = self.end_time.unwrap_or_else(now_millis);
        (end - self.start_time) as f64 / 1000.0
    }
}

/// Experiment tracker bound to one store and experiment
pub struct ExperimentTracker {
    config: TrackingConfig,
    storage: Box<dyn StorageBackend>,
}

impl ExperimentTracker {
    /// Create a tracker for the store named by `config.tracking_uri`.
    ///
    /// Nothing is written until the first run starts.
    pub fn from_config(config: TrackingConfig) -> Result<Self> {
        let root = config.store_root()?;
        let storage = LocalStorage::new(root)?;
        info!(
            tracking_uri = %config.tracking_uri,
            experiment = %config.experiment_name,
            "tracking store resolved"
        );
        Ok(Self::with_storage(config, Box::new(storage)))
    }

    /// Create a tracker on top of an explicit storage backend
    pub fn with_storage(config: TrackingConfig, storage: Box<dyn StorageBackend>) -> Self {
        Self { config, storage }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    /// Open a run in the configured experiment
    pub fn start_run(&self) -> Result<ActiveRun<'_>> {
        let experiment = self
            .storage
            .get_or_create_experiment(&self.config.experiment_name)?;

        let mut run = Run::new(&experiment.experiment_id);
        run.artifact_uri = self
            .storage
            .artifact_uri(&experiment.experiment_id, &run.run_id);
        if let Some(user) = &self.config.user {
            run.user_id = user.clone();
        }
        self.storage.create_run(&run)?;

        info!(
            run_id = %run.run_id,
            experiment_id = %experiment.experiment_id,
            "run started"
        );

        let mut active = ActiveRun {
            tracker: self,
            run,
            finalized: false,
        };

        let run_name = active.run.run_name.clone();
        let user = active.run.user_id.clone();
        active.set_tag("mlflow.runName", run_name)?;
        active.set_tag("mlflow.source.name", env!("CARGO_PKG_NAME"))?;
        active.set_tag("mlflow.user", user)?;

        Ok(active)
    }

    /// Read back a stored run
    pub fn load_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        self.storage.get_run(experiment_id, run_id)
    }

    /// All runs of an experiment, oldest first
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        self.storage.list_runs(experiment_id)
    }
}

/// Handle to an open run. Finalizes the run on drop.
pub struct ActiveRun<'a> {
    tracker: &'a ExperimentTracker,
    run: Run,
    finalized: bool,
}

impl<'a> ActiveRun<'a> {
    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.run.experiment_id
    }

    /// Snapshot of the run as logged so far
    pub fn run(&self) -> &Run {
        &self.run
    }

    fn storage(&self) -> &dyn StorageBackend {
        self.tracker.storage.as_ref()
    }

    /// Log a parameter. Parameters are immutable: re-logging the same value is
    /// a no-op, a different value is an error.
    pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        if let Some(existing) = self.run.params.get(&key) {
            if *existing == value {
                return Ok(());
            }
            return Err(ModellingError::ParamConflict {
                key,
                existing: existing.clone(),
                new: value,
            });
        }

        self.storage().log_param(&self.run, &key, &value)?;
        debug!(run_id = %self.run.run_id, %key, %value, "param logged");
        self.run.params.insert(key, value);
        Ok(())
    }

    /// Log a metric value at `step`
    pub fn log_metric(&mut self, key: impl Into<String>, value: f64, step: u64) -> Result<()> {
        let metric = Metric::new(key, value, step);
        self.storage().log_metric(&self.run, &metric)?;
        debug!(run_id = %self.run.run_id, key = %metric.key, value, step, "metric logged");
        self.run.metrics.insert(metric.key.clone(), value);
        self.run.metrics_history.push(metric);
        Ok(())
    }

    /// Set a tag, overwriting any previous value
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.storage().set_tag(&self.run, &key, &value)?;
        self.run.tags.insert(key, value);
        Ok(())
    }

    /// Store raw bytes under `path` in the run's artifact area, returning its URI
    pub fn log_artifact(&mut self, path: &str, contents: &[u8]) -> Result<String> {
        let uri = self.storage().log_artifact(&self.run, path, contents)?;
        self.run.artifacts.push(path.to_string());
        Ok(uri)
    }

    /// Serialize `model` as JSON under `artifact_path`, alongside an `MLmodel`
    /// descriptor. Returns the URI of the model directory.
    pub fn log_model<M: Serialize>(
        &mut self,
        artifact_path: &str,
        flavor: &str,
        model: &M,
    ) -> Result<String> {
        let artifact_path = artifact_path.trim_matches('/');
        let payload = serde_json::to_vec_pretty(model)?;
        let descriptor = mlmodel_descriptor(artifact_path, flavor, &self.run.run_id);

        self.log_artifact(&format!("{}/{}", artifact_path, MODEL_DATA_FILE), &payload)?;
        self.log_artifact(&format!("{}/MLmodel", artifact_path), descriptor.as_bytes())?;

        info!(
            run_id = %self.run.run_id,
            artifact_path,
            bytes = payload.len(),
            "model logged"
        );

        Ok(format!("{}/{}", self.run.artifact_uri, artifact_path))
    }

    /// Mark the run finished and return its final record
    pub fn finish(mut self) -> Result<Run> {
        self.end(RunStatus::Finished)?;
        Ok(self.run.clone())
    }

    /// Finalize the run with an explicit terminal status
    pub fn end(&mut self, status: RunStatus) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.run.status = status;
        self.run.end_time = Some(now_millis());
        self.storage().update_run(&self.run)?;
        self.finalized = true;

        info!(
            run_id = %self.run.run_id,
            status = ?status,
            duration_secs = self.run.duration_secs(),
            "run ended"
        );
        Ok(())
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        if let Err(e) = self.end(RunStatus::Failed) {
            warn!(run_id = %self.run.run_id, error = %e, "could not mark run as failed");
        }
    }
}

/// File name of the serialized model inside a model artifact directory
pub const MODEL_DATA_FILE: &str = "model.json";

fn mlmodel_descriptor(artifact_path: &str, flavor: &str, run_id: &str) -> String {
    format!(
        "artifact_path: {}\n\
         flavors:\n  {}:\n    data: {}\n    serialization_format: json\n    code_version: {}\n\
         model_uuid: {}\n\
         run_id: {}\n\
         utc_time_created: '{}'\n",
        artifact_path,
        flavor,
        MODEL_DATA_FILE,
        env!("CARGO_PKG_VERSION"),
        Uuid::new_v4().simple(),
        run_id,
        Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"),
    )
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::storage::MemoryStorage;
    use std::sync::Arc;

    fn memory_tracker() -> (ExperimentTracker, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let tracker = ExperimentTracker::with_storage(
            TrackingConfig::default().with_user("tester"),
            Box::new(Arc::clone(&storage)),
        );
        (tracker, storage)
    }

    #[test]
    fn test_run_lifecycle() {
        let (tracker, storage) = memory_tracker();

        let mut run = tracker.start_run().unwrap();
        run.log_param("n_estimators", "100").unwrap();
        run.log_metric("r2_score", 0.87, 0).unwrap();
        let record = run.finish().unwrap();

        assert_eq!(record.status, RunStatus::Finished);
        assert!(record.end_time.is_some());

        let stored = storage.get_run(&record.experiment_id, &record.run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Finished);
        assert_eq!(stored.params.get("n_estimators").map(String::as_str), Some("100"));
        assert_eq!(stored.metrics.get("r2_score"), Some(&0.87));
        assert_eq!(stored.tags.get("mlflow.user").map(String::as_str), Some("tester"));
    }

    #[test]
    fn test_drop_marks_failed() {
        let (tracker, storage) = memory_tracker();

        let (experiment_id, run_id) = {
            let run = tracker.start_run().unwrap();
            (run.experiment_id().to_string(), run.run_id().to_string())
        };

        let stored = storage.get_run(&experiment_id, &run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert!(stored.end_time.is_some());
    }

    #[test]
    fn test_failed_step_inside_scope_marks_failed() {
        let (tracker, storage) = memory_tracker();

        fn body(tracker: &ExperimentTracker) -> Result<String> {
            let mut run = tracker.start_run()?;
            run.log_param("test_size", "0.2")?;
            Err(ModellingError::ValidationError(format!("boom in {}", run.run_id())))
        }

        let err = body(&tracker).unwrap_err();
        let run_id = err.to_string().rsplit(' ').next().unwrap().to_string();

        let stored = storage.get_run("0", &run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.params.len(), 1);
    }

    #[test]
    fn test_param_conflict() {
        let (tracker, _storage) = memory_tracker();
        let mut run = tracker.start_run().unwrap();

        run.log_param("max_depth", "5").unwrap();
        run.log_param("max_depth", "5").unwrap();
        let err = run.log_param("max_depth", "6").unwrap_err();

        assert!(matches!(err, ModellingError::ParamConflict { .. }));
        run.finish().unwrap();
    }

    #[test]
    fn test_metric_history_keeps_latest() {
        let (tracker, _storage) = memory_tracker();
        let mut run = tracker.start_run().unwrap();

        run.log_metric("loss", 1.0, 0).unwrap();
        run.log_metric("loss", 0.5, 1).unwrap();

        assert_eq!(run.run().metrics_history.len(), 2);
        assert_eq!(run.run().metrics.get("loss"), Some(&0.5));
        run.finish().unwrap();
    }

    #[test]
    fn test_log_model_writes_data_and_descriptor() {
        let (tracker, storage) = memory_tracker();
        let mut run = tracker.start_run().unwrap();

        let model: HashMap<&str, f64> = [("weight", 1.5)].into_iter().collect();
        let uri = run.log_model("model", "test_flavor", &model).unwrap();
        let run_id = run.run_id().to_string();
        run.finish().unwrap();

        assert!(uri.ends_with("/model"));
        let data = storage.artifact(&run_id, "model/model.json").unwrap();
        let restored: HashMap<String, f64> = serde_json::from_slice(&data).unwrap();
        assert_eq!(restored.get("weight"), Some(&1.5));

        let descriptor = String::from_utf8(storage.artifact(&run_id, "model/MLmodel").unwrap()).unwrap();
        assert!(descriptor.contains("test_flavor:"));
        assert!(descriptor.contains(&format!("run_id: {}", run_id)));
    }

    #[test]
    fn test_status_codes() {
        for status in [RunStatus::Running, RunStatus::Finished, RunStatus::Failed, RunStatus::Killed] {
            assert_eq!(RunStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(RunStatus::from_code(2), None);
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_run_ids_are_hex_uuids() {
        let run = Run::new("0");
        assert_eq!(run.run_id.len(), 32);
        assert!(run.run_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(run.run_name.starts_with("run-"));
    }
}
