//! Experiment tracking
//!
//! Records run parameters, metrics and model artifacts in an MLflow-compatible
//! store.

pub mod config;
pub mod storage;
pub mod tracker;

pub use config::{resolve_tracking_uri, TrackingConfig, DEFAULT_TRACKING_URI, TRACKING_URI_ENV};
pub use storage::{LocalStorage, MemoryStorage, StorageBackend};
pub use tracker::{ActiveRun, Experiment, ExperimentTracker, Metric, Run, RunStatus};
