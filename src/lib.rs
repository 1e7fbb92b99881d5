//! Insurance modelling - random forest training with run tracking
//!
//! This crate trains a random forest regressor on the preprocessed insurance
//! dataset and records each run in an MLflow-compatible tracking store.
//!
//! # Modules
//!
//! - [`training`] - Dataset extraction, train/test split, forest, metrics and the run driver
//! - [`tracking`] - Experiment tracking with file and in-memory stores
//! - [`utils`] - CSV loading
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod training;

// Infrastructure
pub mod tracking;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{ModellingError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ModellingError, Result};

    // Training
    pub use crate::training::{
        Dataset, RandomForest, RunConfiguration, RunSummary, TrainTestSplit, TrainingRunner,
    };

    // Experiment tracking
    pub use crate::tracking::{ExperimentTracker, LocalStorage, Run, RunStatus, TrackingConfig};

    // Data loading
    pub use crate::utils::DataLoader;
}
