//! Artifact store port: Trait for persisting trained model state.
//!
//! This trait abstracts the storage backend (filesystem) from the
//! training and inference use cases.

use crate::domain::{ClassifierState, ScalerState, TrainingMetrics};

/// Everything one training run produces.
#[derive(Debug, Clone)]
pub struct TrainedArtifacts {
    pub scaler: ScalerState,
    pub classifier: ClassifierState,
    pub metrics: TrainingMetrics,
}

/// Scaler and classifier written by the same training run.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedModel {
    pub scaler: ScalerState,
    pub classifier: ClassifierState,
}

/// Trait for durable artifact storage.
///
/// Loaded state is read-only; the only mutation is replacing the whole
/// artifact set with [`save`](ArtifactStore::save).
pub trait ArtifactStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a complete artifact set.
    ///
    /// Either all artifacts are replaced or none are.
    ///
    /// # Errors
    /// Returns error if any artifact cannot be written. The previously
    /// persisted set is still in place when this returns an error.
    fn save(&self, artifacts: &TrainedArtifacts) -> Result<(), Self::Error>;

    /// Load the scaler and classifier as one unit.
    ///
    /// # Returns
    /// `None` if either artifact has not been persisted.
    ///
    /// # Errors
    /// Returns error if an artifact exists but cannot be read, is corrupt,
    /// or the two were written by different training runs.
    fn load_model(&self) -> Result<Option<PersistedModel>, Self::Error>;

    /// Load the metrics record of the last training run.
    ///
    /// # Returns
    /// `None` if no metrics have been persisted.
    ///
    /// # Errors
    /// Returns error if the record exists but cannot be parsed.
    fn load_metrics(&self) -> Result<Option<TrainingMetrics>, Self::Error>;

    /// Check whether both model artifacts are present.
    fn has_artifacts(&self) -> Result<bool, Self::Error>;
}
