//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the two use cases of the application: offline training and online
//! scoring.

mod inference;
mod training;

pub use inference::{Availability, InferenceService};
pub use training::{
    TrainingConfig, TrainingPipeline, CROSS_VALIDATION_FOLDS, RANDOM_SEED, TEST_RATIO,
};
