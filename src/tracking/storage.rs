//! Storage backends for experiment tracking
//!
//! [`LocalStorage`] writes the directory layout used by MLflow's file store,
//! so `mlflow ui --backend-store-uri <root>` can browse the runs.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::config::DEFAULT_EXPERIMENT_NAME;
use super::tracker::{now_millis, Experiment, Metric, Run, RunStatus};
use crate::error::{ModellingError, Result};

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Look up an experiment by name, creating it when absent
    fn get_or_create_experiment(&self, name: &str) -> Result<Experiment>;

    /// URI of the artifact root for a run
    fn artifact_uri(&self, experiment_id: &str, run_id: &str) -> String;

    /// Persist a newly started run
    fn create_run(&self, run: &Run) -> Result<()>;

    fn log_param(&self, run: &Run, key: &str, value: &str) -> Result<()>;

    fn log_metric(&self, run: &Run, metric: &Metric) -> Result<()>;

    fn set_tag(&self, run: &Run, key: &str, value: &str) -> Result<()>;

    /// Store an artifact at `path` relative to the run's artifact root
    fn log_artifact(&self, run: &Run, path: &str, contents: &[u8]) -> Result<String>;

    /// Persist status and end time
    fn update_run(&self, run: &Run) -> Result<()>;

    fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<Run>;

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        (**self).get_or_create_experiment(name)
    }

    fn artifact_uri(&self, experiment_id: &str, run_id: &str) -> String {
        (**self).artifact_uri(experiment_id, run_id)
    }

    fn create_run(&self, run: &Run) -> Result<()> {
        (**self).create_run(run)
    }

    fn log_param(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        (**self).log_param(run, key, value)
    }

    fn log_metric(&self, run: &Run, metric: &Metric) -> Result<()> {
        (**self).log_metric(run, metric)
    }

    fn set_tag(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        (**self).set_tag(run, key, value)
    }

    fn log_artifact(&self, run: &Run, path: &str, contents: &[u8]) -> Result<String> {
        (**self).log_artifact(run, path, contents)
    }

    fn update_run(&self, run: &Run) -> Result<()> {
        (**self).update_run(run)
    }

    fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        (**self).get_run(experiment_id, run_id)
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        (**self).list_runs(experiment_id)
    }
}

/// Id given to a new experiment: `0` for the default experiment, otherwise one
/// past the largest numeric id in use
fn next_experiment_id<'a>(name: &str, existing: impl Iterator<Item = &'a str>) -> String {
    if name == DEFAULT_EXPERIMENT_NAME {
        return "0".to_string();
    }
    let max = existing.filter_map(|id| id.parse::<u64>().ok()).max();
    (max.unwrap_or(0) + 1).to_string()
}

/// Reject keys that are empty or would escape their directory
fn validate_key(kind: &str, key: &str) -> Result<()> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes || key.contains('\\') {
        return Err(ModellingError::TrackingError(format!(
            "invalid {} name '{}'",
            kind, key
        )));
    }
    Ok(())
}

// ─── Local file store ──────────────────────────────────────────────────────────

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a store rooted at `base_dir`. The directory is created lazily.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = std::path::absolute(base_dir.into())?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.base_dir.join(experiment_id)
    }

    fn run_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment_id).join(run_id)
    }

    fn run_dir_of(&self, run: &Run) -> PathBuf {
        self.run_dir(&run.experiment_id, &run.run_id)
    }

    fn file_uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    fn list_experiments(&self) -> Result<Vec<Experiment>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut experiments = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let meta_path = entry?.path().join(META_FILE);
            if !meta_path.is_file() {
                continue;
            }
            let meta: ExperimentMeta = read_yaml(&meta_path)?;
            if meta.experiment_id.is_empty() || meta.lifecycle_stage == LIFECYCLE_DELETED {
                continue;
            }
            experiments.push(Experiment {
                experiment_id: meta.experiment_id,
                name: meta.name,
                artifact_location: meta.artifact_location,
                created_at: meta.creation_time,
            });
        }
        Ok(experiments)
    }

    fn write_run_meta(&self, run: &Run) -> Result<()> {
        let meta = RunMeta {
            artifact_uri: run.artifact_uri.clone(),
            end_time: run.end_time,
            experiment_id: run.experiment_id.clone(),
            lifecycle_stage: LIFECYCLE_ACTIVE.to_string(),
            run_id: run.run_id.clone(),
            run_name: run.run_name.clone(),
            run_uuid: run.run_id.clone(),
            source_type: SOURCE_TYPE_LOCAL,
            start_time: run.start_time,
            status: run.status.code(),
            user_id: run.user_id.clone(),
            ..Default::default()
        };
        write_yaml(&self.run_dir_of(run).join(META_FILE), &meta)
    }

    fn read_dir_files(dir: &Path) -> Result<Vec<(String, String)>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                let key = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                out.push((key, fs::read_to_string(&path)?));
            }
        }
        out.sort();
        Ok(out)
    }

    fn collect_artifacts(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_artifacts(root, &path, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

impl StorageBackend for LocalStorage {
    fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let experiments = self.list_experiments()?;
        if let Some(existing) = experiments.iter().find(|e| e.name == name) {
            return Ok(existing.clone());
        }

        let experiment_id = next_experiment_id(name, experiments.iter().map(|e| e.experiment_id.as_str()));
        let dir = self.experiment_dir(&experiment_id);
        fs::create_dir_all(&dir)?;

        let created_at = now_millis();
        let experiment = Experiment {
            experiment_id,
            name: name.to_string(),
            artifact_location: Self::file_uri(&dir),
            created_at,
        };

        let meta = ExperimentMeta {
            artifact_location: experiment.artifact_location.clone(),
            creation_time: created_at,
            experiment_id: experiment.experiment_id.clone(),
            last_update_time: created_at,
            lifecycle_stage: LIFECYCLE_ACTIVE.to_string(),
            name: experiment.name.clone(),
        };
        write_yaml(&dir.join(META_FILE), &meta)?;

        Ok(experiment)
    }

    fn artifact_uri(&self, experiment_id: &str, run_id: &str) -> String {
        Self::file_uri(&self.run_dir(experiment_id, run_id).join("artifacts"))
    }

    fn create_run(&self, run: &Run) -> Result<()> {
        let dir = self.run_dir_of(run);
        if dir.exists() {
            return Err(ModellingError::TrackingError(format!(
                "run directory already exists: {}",
                dir.display()
            )));
        }
        for sub in ["params", "metrics", "tags", "artifacts"] {
            fs::create_dir_all(dir.join(sub))?;
        }
        self.write_run_meta(run)
    }

    fn log_param(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        validate_key("param", key)?;
        let path = self.run_dir_of(run).join("params").join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn log_metric(&self, run: &Run, metric: &Metric) -> Result<()> {
        validate_key("metric", &metric.key)?;
        let path = self.run_dir_of(run).join("metrics").join(&metric.key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(
            file,
            "{} {} {}",
            metric.timestamp,
            format_metric_value(metric.value),
            metric.step
        )?;
        Ok(())
    }

    fn set_tag(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        validate_key("tag", key)?;
        let path = self.run_dir_of(run).join("tags").join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn log_artifact(&self, run: &Run, path: &str, contents: &[u8]) -> Result<String> {
        validate_key("artifact", path)?;
        let target = self.run_dir_of(run).join("artifacts").join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, contents)?;
        Ok(Self::file_uri(&target))
    }

    fn update_run(&self, run: &Run) -> Result<()> {
        self.write_run_meta(run)
    }

    fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        let dir = self.run_dir(experiment_id, run_id);
        let meta_path = dir.join(META_FILE);
        if !meta_path.is_file() {
            return Err(ModellingError::TrackingError(format!(
                "run '{}' not found in experiment '{}'",
                run_id, experiment_id
            )));
        }
        let meta: RunMeta = read_yaml(&meta_path)?;

        let status = RunStatus::from_code(meta.status).ok_or_else(|| {
            ModellingError::TrackingError(format!(
                "run '{}' has unknown status code {}",
                run_id, meta.status
            ))
        })?;

        let mut run = Run::new(experiment_id);
        run.run_id = run_id.to_string();
        run.run_name = meta.run_name;
        run.status = status;
        run.start_time = meta.start_time;
        run.end_time = meta.end_time;
        run.artifact_uri = meta.artifact_uri;
        run.user_id = meta.user_id;

        run.params = Self::read_dir_files(&dir.join("params"))?.into_iter().collect();
        run.tags = Self::read_dir_files(&dir.join("tags"))?.into_iter().collect();

        for (key, contents) in Self::read_dir_files(&dir.join("metrics"))? {
            for line in contents.lines() {
                let mut fields = line.split_whitespace();
                let (Some(ts), Some(value), step) = (fields.next(), fields.next(), fields.next()) else {
                    continue;
                };
                let (Ok(timestamp), Ok(value)) = (ts.parse::<i64>(), value.parse::<f64>()) else {
                    continue;
                };
                let step = step.and_then(|s| s.parse().ok()).unwrap_or(0);
                run.metrics.insert(key.clone(), value);
                run.metrics_history.push(Metric {
                    key: key.clone(),
                    value,
                    step,
                    timestamp,
                });
            }
        }

        let artifact_root = dir.join("artifacts");
        Self::collect_artifacts(&artifact_root, &artifact_root, &mut run.artifacts)?;
        run.artifacts.sort();

        Ok(run)
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        let dir = self.experiment_dir(experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.join(META_FILE).is_file() {
                if let Some(run_id) = path.file_name().and_then(|n| n.to_str()) {
                    runs.push(self.get_run(experiment_id, run_id)?);
                }
            }
        }
        runs.sort_by_key(|r| r.start_time);
        Ok(runs)
    }
}

// ─── In-memory store ───────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    experiments: Vec<Experiment>,
    runs: HashMap<String, Run>,
    artifacts: HashMap<(String, String), Vec<u8>>,
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of a stored artifact
    pub fn artifact(&self, run_id: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .artifacts
            .get(&(run_id.to_string(), path.to_string()))
            .cloned()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().runs.len()
    }

    fn with_run<F>(&self, run: &Run, f: F) -> Result<()>
    where
        F: FnOnce(&mut Run),
    {
        let mut state = self.state.lock();
        let stored = state.runs.get_mut(&run.run_id).ok_or_else(|| {
            ModellingError::TrackingError(format!("run '{}' was never created", run.run_id))
        })?;
        f(stored);
        Ok(())
    }
}

impl StorageBackend for MemoryStorage {
    fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let mut state = self.state.lock();
        if let Some(existing) = state.experiments.iter().find(|e| e.name == name) {
            return Ok(existing.clone());
        }
        let experiment_id =
            next_experiment_id(name, state.experiments.iter().map(|e| e.experiment_id.as_str()));
        let experiment = Experiment {
            artifact_location: format!("memory://{}", experiment_id),
            experiment_id,
            name: name.to_string(),
            created_at: now_millis(),
        };
        state.experiments.push(experiment.clone());
        Ok(experiment)
    }

    fn artifact_uri(&self, experiment_id: &str, run_id: &str) -> String {
        format!("memory://{}/{}/artifacts", experiment_id, run_id)
    }

    fn create_run(&self, run: &Run) -> Result<()> {
        let mut state = self.state.lock();
        if state.runs.contains_key(&run.run_id) {
            return Err(ModellingError::TrackingError(format!(
                "run '{}' already exists",
                run.run_id
            )));
        }
        state.runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    fn log_param(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        validate_key("param", key)?;
        self.with_run(run, |r| {
            r.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metric(&self, run: &Run, metric: &Metric) -> Result<()> {
        validate_key("metric", &metric.key)?;
        self.with_run(run, |r| {
            r.metrics.insert(metric.key.clone(), metric.value);
            r.metrics_history.push(metric.clone());
        })
    }

    fn set_tag(&self, run: &Run, key: &str, value: &str) -> Result<()> {
        validate_key("tag", key)?;
        self.with_run(run, |r| {
            r.tags.insert(key.to_string(), value.to_string());
        })
    }

    fn log_artifact(&self, run: &Run, path: &str, contents: &[u8]) -> Result<String> {
        validate_key("artifact", path)?;
        self.with_run(run, |r| r.artifacts.push(path.to_string()))?;
        self.state
            .lock()
            .artifacts
            .insert((run.run_id.clone(), path.to_string()), contents.to_vec());
        Ok(format!("{}/{}", run.artifact_uri, path))
    }

    fn update_run(&self, run: &Run) -> Result<()> {
        self.with_run(run, |r| {
            r.status = run.status;
            r.end_time = run.end_time;
        })
    }

    fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<Run> {
        self.state
            .lock()
            .runs
            .get(run_id)
            .filter(|r| r.experiment_id == experiment_id)
            .cloned()
            .ok_or_else(|| {
                ModellingError::TrackingError(format!(
                    "run '{}' not found in experiment '{}'",
                    run_id, experiment_id
                ))
            })
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self
            .state
            .lock()
            .runs
            .values()
            .filter(|r| r.experiment_id == experiment_id)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.start_time);
        Ok(runs)
    }
}

// ─── meta.yaml documents ───────────────────────────────────────────────────────

const META_FILE: &str = "meta.yaml";
const LIFECYCLE_ACTIVE: &str = "active";
const LIFECYCLE_DELETED: &str = "deleted";
/// MLflow `SourceType.LOCAL`
const SOURCE_TYPE_LOCAL: u8 = 4;

/// `<root>/<experiment_id>/meta.yaml`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ExperimentMeta {
    artifact_location: String,
    creation_time: i64,
    experiment_id: String,
    last_update_time: i64,
    lifecycle_stage: String,
    name: String,
}

/// `<root>/<experiment_id>/<run_id>/meta.yaml`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RunMeta {
    artifact_uri: String,
    end_time: Option<i64>,
    entry_point_name: String,
    experiment_id: String,
    lifecycle_stage: String,
    run_id: String,
    run_name: String,
    run_uuid: String,
    source_name: String,
    source_type: u8,
    source_version: String,
    start_time: i64,
    status: u8,
    tags: Vec<String>,
    user_id: String,
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

/// Metric values use the spelling MLflow's file store reads and writes
fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}
