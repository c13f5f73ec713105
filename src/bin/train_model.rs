//! Model training utility.
//!
//! Fits the scaler and logistic regression on the CSV dataset and writes
//! `Heart_Attack_scaler.bin`, `Heart_Attack_model.bin` and `metrics.json`
//! into the model directory. Paths and hyperparameters come from the
//! `LIFEBEAT_*` environment variables.
//!
//! # Usage
//!
//! ```bash
//! LIFEBEAT_DATA_PATH=data/Heart_Attack_data.csv cargo run --bin train_model
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use lifebeat::adapters::csv::CsvDataset;
use lifebeat::adapters::fs::FsArtifactStore;
use lifebeat::application::TrainingPipeline;
use lifebeat::config::AppConfig;

fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _guard = lifebeat::logging::init(&config.log).context("Failed to initialize logging")?;

    tracing::info!("Starting training run...");
    let pipeline = TrainingPipeline::new(
        CsvDataset::new(&config.data_path),
        Arc::new(FsArtifactStore::new(&config.model_dir)),
        config.training,
    );

    let metrics = pipeline.run().inspect_err(|e| {
        tracing::error!("Training aborted: {}", e);
    })?;

    println!("Model accuracy: {:.4}", metrics.accuracy);
    println!(
        "Cross validation score ({} folds, {}): {:.4}",
        metrics.cross_validation_folds, metrics.cross_validation_scope, metrics.cross_validation_score
    );
    println!("Artifacts saved to {}", config.model_dir.display());
    Ok(())
}
