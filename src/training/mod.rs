//! Model training module
//!
//! Provides the pieces of a training run:
//! - Dataset extraction from a polars frame
//! - Seeded train/test splitting
//! - Decision tree and random forest regressors
//! - Regression metrics
//! - The [`TrainingRunner`] tying them to a tracking store

mod config;
pub mod dataset;
pub mod decision_tree;
pub mod metrics;
pub mod random_forest;
pub mod runner;
pub mod split;

pub use config::{RunConfiguration, DATA_FILE_NAME, RANDOM_STATE};
pub use dataset::{Dataset, TARGET_COLUMN};
pub use decision_tree::{DecisionTree, TreeNode};
pub use metrics::{mean_squared_error, r2_score};
pub use random_forest::RandomForest;
pub use runner::{
    loading_line, score_line, RunSummary, TrainingRunner, COMPLETED_LINE, MODEL_ARTIFACT_PATH,
    R2_METRIC,
};
pub use split::{Split, SplitIndices, TrainTestSplit};
