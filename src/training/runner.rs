//! End-to-end training run: load, split, fit, evaluate, record

use super::config::{RunConfiguration, RANDOM_STATE};
use super::dataset::{Dataset, TARGET_COLUMN};
use super::random_forest::RandomForest;
use super::split::TrainTestSplit;
use crate::error::Result;
use crate::tracking::{ExperimentTracker, TrackingConfig};
use crate::utils::DataLoader;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Artifact path the fitted model is stored under
pub const MODEL_ARTIFACT_PATH: &str = "model";

/// Name of the R² metric on the tracking run
pub const R2_METRIC: &str = "r2_score";

/// Printed once training and logging are done
pub const COMPLETED_LINE: &str = "Model training completed.";

/// Progress line printed before the data file is read
pub fn loading_line(path: &Path) -> String {
    format!("Loading data from: {}", path.display())
}

/// Final score line, four decimals (`nan` when R² is undefined)
pub fn score_line(r2: f64) -> String {
    if r2.is_nan() {
        "R² Score: nan".to_string()
    } else {
        format!("R² Score: {:.4}", r2)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub experiment_id: String,
    /// R² on the held-out split
    pub r2_score: f64,
    pub n_train: usize,
    pub n_test: usize,
    /// URI of the logged model directory
    pub artifact_uri: String,
    pub training_time_secs: f64,
}

/// Drives one training run against a tracking store
pub struct TrainingRunner {
    config: RunConfiguration,
    tracker: ExperimentTracker,
    loader: DataLoader,
}

impl TrainingRunner {
    /// Create a runner recording into the store named by `tracking`
    pub fn new(config: RunConfiguration, tracking: TrackingConfig) -> Result<Self> {
        let tracker = ExperimentTracker::from_config(tracking)?;
        Ok(Self::with_tracker(config, tracker))
    }

    /// Create a runner on top of an existing tracker
    pub fn with_tracker(config: RunConfiguration, tracker: ExperimentTracker) -> Self {
        Self {
            config,
            tracker,
            loader: DataLoader::new(),
        }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn tracker(&self) -> &ExperimentTracker {
        &self.tracker
    }

    /// Execute the run.
    ///
    /// Data and split errors surface before a tracking run is opened. Once a
    /// run is open it is finalized on every path: FINISHED on success, FAILED
    /// when any later step returns an error.
    pub fn run(&self) -> Result<RunSummary> {
        let data_path = self.config.data_path();
        println!("{}", loading_line(&data_path));

        let df = self.loader.load_csv(&data_path)?;
        let dataset = Dataset::from_frame(&df, TARGET_COLUMN)?;
        let split = TrainTestSplit::new(self.config.test_size)
            .with_random_state(RANDOM_STATE)
            .split(&dataset)?;

        info!(
            rows = dataset.n_rows(),
            features = dataset.n_features(),
            n_train = split.n_train(),
            n_test = split.n_test(),
            "data split"
        );

        let mut active = self.tracker.start_run()?;
        for (key, value) in self.config.tracked_params() {
            active.log_param(key, value)?;
        }

        let start = Instant::now();
        let mut model =
            RandomForest::new_regressor(self.config.n_estimators).with_random_state(RANDOM_STATE);
        if let Some(depth) = self.config.max_depth {
            model = model.with_max_depth(depth);
        }
        model.fit(&split.x_train, &split.y_train)?;
        let training_time_secs = start.elapsed().as_secs_f64();

        let r2_score = model.score(&split.x_test, &split.y_test)?;
        info!(
            r2_score,
            training_time_secs,
            max_tree_depth = model.max_tree_depth(),
            "model evaluated"
        );

        active.log_metric(R2_METRIC, r2_score, 0)?;
        let artifact_uri = active.log_model(MODEL_ARTIFACT_PATH, "random_forest", &model)?;

        println!("{}", COMPLETED_LINE);
        println!("{}", score_line(r2_score));

        let run = active.finish()?;

        Ok(RunSummary {
            run_id: run.run_id,
            experiment_id: run.experiment_id,
            r2_score,
            n_train: split.n_train(),
            n_test: split.n_test(),
            artifact_uri,
            training_time_secs,
        })
    }
}
