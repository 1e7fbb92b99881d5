//! Insurance modelling CLI
//!
//! Flag parsing and the command that drives a training run.

use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::tracking::TrackingConfig;
use crate::training::{RunConfiguration, RunSummary, TrainingRunner};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{:<16} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "modelling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train a random forest on the preprocessed insurance data and record the run")]
#[command(long_about = None)]
pub struct Cli {
    /// Fraction of rows held out for evaluation
    #[arg(long = "test_size", default_value_t = 0.2)]
    pub test_size: f64,

    /// Number of trees in the forest
    #[arg(long = "n_estimators", default_value_t = 100)]
    pub n_estimators: usize,

    /// Maximum depth of each tree
    #[arg(long = "max_depth", default_value_t = 5)]
    pub max_depth: usize,

    /// Directory containing insurance_train_preprocessed.csv
    #[arg(long = "data_dir", default_value = "insurance_preprocessing")]
    pub data_dir: PathBuf,
}

impl Cli {
    /// Convert parsed flags into a run configuration
    pub fn into_config(self) -> RunConfiguration {
        RunConfiguration::new(self.data_dir)
            .with_test_size(self.test_size)
            .with_n_estimators(self.n_estimators)
            .with_max_depth(Some(self.max_depth))
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run one training job and print a short summary
pub fn cmd_train(cli: Cli, tracking: TrackingConfig) -> anyhow::Result<RunSummary> {
    let tracking_uri = tracking.tracking_uri.clone();
    let experiment = tracking.experiment_name.clone();

    let runner = TrainingRunner::new(cli.into_config(), tracking)?;
    let summary = runner.run()?;

    section("Run");
    step_ok(&format!("run {} finished", summary.run_id));
    println!("  {}", kv("Experiment", &format!("{} ({})", experiment, summary.experiment_id)));
    println!("  {}", kv("Tracking URI", &tracking_uri));
    println!("  {}", kv("Train / test", &format!("{} / {}", summary.n_train, summary.n_test)));
    println!("  {}", kv("Fit time", &format!("{:.3}s", summary.training_time_secs)));
    println!("  {}", kv("Model", &summary.artifact_uri));
    println!();

    Ok(summary)
}
