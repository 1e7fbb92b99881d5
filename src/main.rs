//! Insurance modelling - Main Entry Point
//!
//! Trains a random forest regressor and records the run in the tracking store.

use clap::Parser;
use insurance_modelling::cli::{cmd_train, Cli};
use insurance_modelling::tracking::TrackingConfig;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insurance_modelling=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let tracking = TrackingConfig::from_env();

    cmd_train(cli, tracking)?;

    Ok(())
}
