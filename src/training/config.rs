//! Training run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Seed shared by the train/test split and the forest
pub const RANDOM_STATE: u64 = 42;

/// File expected inside the data directory
pub const DATA_FILE_NAME: &str = "insurance_train_preprocessed.csv";

/// Hyperparameters and input location for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Number of trees in the forest
    pub n_estimators: usize,

    /// Maximum depth per tree (`None` grows trees until leaves are pure)
    pub max_depth: Option<usize>,

    /// Directory holding the preprocessed training file
    pub data_dir: PathBuf,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            n_estimators: 100,
            max_depth: Some(5),
            data_dir: PathBuf::from("insurance_preprocessing"),
        }
    }
}

impl RunConfiguration {
    /// Create a configuration with default hyperparameters reading from `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Full path of the training CSV
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Parameters as recorded on the tracking run, in logging order
    pub fn tracked_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("test_size", self.test_size.to_string()),
            ("n_estimators", self.n_estimators.to_string()),
            (
                "max_depth",
                self.max_depth
                    .map_or_else(|| "None".to_string(), |d| d.to_string()),
            ),
        ]
    }
}
