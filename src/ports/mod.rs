//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the use cases and external systems (artifact storage, the
//! training data source).

mod artifact_store;
mod dataset_source;

pub use artifact_store::{ArtifactStore, PersistedModel, TrainedArtifacts};
pub use dataset_source::DatasetSource;
