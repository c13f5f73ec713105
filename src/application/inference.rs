//! Inference service: Scores single patients with the persisted model.
//!
//! Lifecycle:
//! - Construct with an artifact store
//! - `initialize()` once at startup, before accepting requests
//! - `score()` from any number of threads
//!
//! The loaded scaler and classifier are immutable after initialization, so
//! scoring takes no locks.

use std::sync::{Arc, OnceLock};

use crate::adapters::StorageError;
use crate::domain::{PatientFeatures, RiskAssessment, TrainingMetrics, DEFAULT_THRESHOLD};
use crate::ports::{ArtifactStore, PersistedModel};
use crate::{LifebeatError, Result};

/// Outcome of [`InferenceService::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Both artifacts loaded; scoring is available.
    Ready,
    /// Artifacts absent or corrupt; every scoring call fails fast.
    Unavailable(String),
}

impl Availability {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[derive(Debug)]
enum ServiceState {
    Ready(PersistedModel),
    Unavailable(String),
}

/// Service answering single-record scoring requests.
pub struct InferenceService<S>
where
    S: ArtifactStore,
{
    store: Arc<S>,
    state: OnceLock<ServiceState>,
    threshold: f64,
}

impl<S> InferenceService<S>
where
    S: ArtifactStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create an uninitialized service with the default decision threshold.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: OnceLock::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Use a custom decision threshold for the returned label.
    ///
    /// # Errors
    /// Returns `Config` if the threshold is outside [0, 1].
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LifebeatError::Config(format!(
                "Decision threshold must be in [0, 1], got {threshold}"
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Load the scaler and classifier from storage.
    ///
    /// Loading happens at most once; concurrent callers block until the
    /// first finishes and then observe the same outcome. A missing or
    /// corrupt artifact leaves the service unavailable for its lifetime.
    pub fn initialize(&self) -> Availability {
        let state = self.state.get_or_init(|| {
            tracing::info!("Initializing inference service...");
            match self.load_model() {
                Ok(model) => {
                    tracing::info!("Model and scaler loaded successfully");
                    ServiceState::Ready(model)
                }
                Err(reason) => {
                    tracing::warn!("Inference service unavailable: {}", reason);
                    ServiceState::Unavailable(reason)
                }
            }
        });

        match state {
            ServiceState::Ready(_) => Availability::Ready,
            ServiceState::Unavailable(reason) => Availability::Unavailable(reason.clone()),
        }
    }

    fn load_model(&self) -> std::result::Result<PersistedModel, String> {
        let present = self
            .store
            .has_artifacts()
            .map_err(|e| format!("Artifact store not readable: {}", storage_reason(e)))?;
        if !present {
            return Err("Model artifacts not found".to_string());
        }
        self.store
            .load_model()
            .map_err(|e| format!("Model could not be loaded: {}", storage_reason(e)))?
            .ok_or_else(|| "Model artifacts not found".to_string())
    }

    /// Check whether initialization succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state.get(), Some(ServiceState::Ready(_)))
    }

    fn model(&self) -> Result<&PersistedModel> {
        match self.state.get() {
            Some(ServiceState::Ready(model)) => Ok(model),
            Some(ServiceState::Unavailable(reason)) => {
                Err(LifebeatError::ModelUnavailable(reason.clone()))
            }
            None => Err(LifebeatError::ModelUnavailable(
                "Inference service not initialized".to_string(),
            )),
        }
    }

    /// Score one patient.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` before a successful `initialize()`, and
    /// `Validation` if any measurement is out of range.
    pub fn score(&self, patient: &PatientFeatures) -> Result<RiskAssessment> {
        let model = self.model()?;
        patient
            .validate()
            .map_err(|errors| LifebeatError::Validation(errors.join("; ")))?;

        let scaled = model.scaler.transform(&patient.to_vec())?;
        let probability = model.classifier.predict_probability(&scaled)?;
        let assessment = RiskAssessment::new(probability, self.threshold);

        tracing::debug!(
            "Scored patient: risk={}, label={}",
            assessment.risk_level,
            assessment.label
        );
        Ok(assessment)
    }

    /// Score a raw feature vector in model order.
    ///
    /// # Errors
    /// As [`score`](Self::score), plus `Validation` for a wrong length.
    pub fn score_vector(&self, vector: &[f64]) -> Result<RiskAssessment> {
        self.model()?;
        self.score(&PatientFeatures::from_vec(vector)?)
    }

    /// Read the metrics record of the last training run.
    ///
    /// Independent of the loaded model: metrics are read from storage on
    /// every call.
    ///
    /// # Errors
    /// Returns `NotFound` if no training run has been persisted.
    pub fn get_metrics(&self) -> Result<TrainingMetrics> {
        self.store
            .load_metrics()
            .map_err(|e| LifebeatError::Storage(e.into()))?
            .ok_or_else(|| LifebeatError::NotFound("Metrics not found".to_string()))
    }
}

fn storage_reason<E: Into<StorageError>>(error: E) -> String {
    let error: StorageError = error.into();
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fs::FsArtifactStore;
    use crate::domain::{
        ClassifierState, ConfusionMatrix, CrossValidationScope, ScalerState, FEATURE_COUNT,
    };
    use crate::ports::TrainedArtifacts;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::tempdir;

    fn reference_patient() -> PatientFeatures {
        PatientFeatures::from_vec(&[
            63.0, 1.0, 3.0, 145.0, 233.0, 1.0, 0.0, 150.0, 0.0, 2.3, 0.0, 0.0, 1.0,
        ])
        .expect("patient")
    }

    fn persist_model(dir: &Path, bias: f64) {
        let artifacts = TrainedArtifacts {
            scaler: ScalerState::new(vec![0.0; FEATURE_COUNT], vec![1.0; FEATURE_COUNT])
                .expect("scaler"),
            classifier: ClassifierState::new(vec![0.0; FEATURE_COUNT], bias).expect("classifier"),
            metrics: TrainingMetrics {
                accuracy: 0.8,
                cross_validation_score: 0.75,
                cross_validation_folds: 7,
                cross_validation_scope: CrossValidationScope::TrainingSplit,
                precision: 0.8,
                recall: 0.8,
                f1_score: 0.8,
                roc_auc: Some(0.9),
                confusion_matrix: ConfusionMatrix::default(),
                feature_importance: BTreeMap::new(),
                train_samples: 80,
                test_samples: 20,
                seed: 62,
                iterations: 5,
                converged: true,
                trained_at: chrono::Utc::now(),
            },
        };
        FsArtifactStore::new(dir).save(&artifacts).expect("save");
    }

    fn service(dir: &Path) -> InferenceService<FsArtifactStore> {
        InferenceService::new(Arc::new(FsArtifactStore::new(dir)))
    }

    #[test]
    fn test_score_before_initialize_fails_fast() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 0.0);
        let service = service(temp.path());
        assert!(!service.is_ready());
        let err = service.score(&reference_patient()).expect_err("not initialized");
        assert!(matches!(err, LifebeatError::ModelUnavailable(_)));
    }

    #[test]
    fn test_missing_artifacts_make_service_unavailable() {
        let temp = tempdir().expect("tempdir");
        let service = service(temp.path());
        assert_eq!(
            service.initialize(),
            Availability::Unavailable("Model artifacts not found".to_string())
        );
        assert!(matches!(
            service.score(&reference_patient()),
            Err(LifebeatError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_scaler_without_model_is_not_found() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 0.0);
        std::fs::remove_file(FsArtifactStore::new(temp.path()).model_path()).expect("remove");

        assert_eq!(
            service(temp.path()).initialize(),
            Availability::Unavailable("Model artifacts not found".to_string())
        );
    }

    #[test]
    fn test_artifacts_from_different_runs_make_service_unavailable() {
        let temp = tempdir().expect("tempdir");
        let old = temp.path().join("old");
        let new = temp.path().join("new");
        persist_model(&old, 0.0);
        persist_model(&new, 1.0);
        let old_store = FsArtifactStore::new(&old);
        std::fs::copy(FsArtifactStore::new(&new).model_path(), old_store.model_path())
            .expect("copy");

        let service = service(&old);
        match service.initialize() {
            Availability::Unavailable(reason) => assert!(reason.contains("run")),
            Availability::Ready => panic!("mixed scaler and model must not load"),
        }
        assert!(matches!(
            service.score(&reference_patient()),
            Err(LifebeatError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_initialize_loads_exactly_once() {
        let temp = tempdir().expect("tempdir");
        let service = service(temp.path());
        assert!(!service.initialize().is_ready());

        // Artifacts appearing later do not flip an already-initialized service.
        persist_model(temp.path(), 0.0);
        assert!(!service.initialize().is_ready());
        assert!(!service.is_ready());
    }

    #[test]
    fn test_score_uses_loaded_model() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 0.0);
        let service = service(temp.path());
        assert_eq!(service.initialize(), Availability::Ready);

        let assessment = service.score(&reference_patient()).expect("score");
        assert!((assessment.probability - 0.5).abs() < 1e-12);
        assert_eq!(assessment.label, 1);
        assert_eq!(
            assessment.message,
            "The model predicts a 50.00% probability of the patient having a heart attack."
        );
    }

    #[test]
    fn test_threshold_changes_label_only() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 0.0);
        let service = service(temp.path()).with_threshold(0.6).expect("threshold");
        service.initialize();
        let assessment = service.score(&reference_patient()).expect("score");
        assert_eq!(assessment.label, 0);
        assert!((assessment.probability - 0.5).abs() < 1e-12);

        assert!(InferenceService::new(Arc::new(FsArtifactStore::new(temp.path())))
            .with_threshold(1.5)
            .is_err());
    }

    #[test]
    fn test_invalid_patient_is_validation_error() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 0.0);
        let service = service(temp.path());
        service.initialize();

        let mut patient = reference_patient();
        patient.age = -1.0;
        patient.cp = 9.0;
        match service.score(&patient) {
            Err(LifebeatError::Validation(message)) => {
                assert!(message.contains("Age"));
                assert!(message.contains("cp"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            service.score_vector(&[1.0, 2.0]),
            Err(LifebeatError::Validation(_))
        ));
    }

    #[test]
    fn test_get_metrics() {
        let temp = tempdir().expect("tempdir");
        let service = service(temp.path());
        assert!(matches!(service.get_metrics(), Err(LifebeatError::NotFound(_))));

        persist_model(temp.path(), 0.0);
        let metrics = service.get_metrics().expect("metrics");
        assert!((metrics.accuracy - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_scoring() {
        let temp = tempdir().expect("tempdir");
        persist_model(temp.path(), 1.0);
        let service = Arc::new(service(temp.path()));
        service.initialize();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| service.score(&reference_patient()).expect("score").probability)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let expected = crate::domain::sigmoid(1.0);
        for handle in handles {
            for p in handle.join().expect("thread") {
                assert_eq!(p, expected);
            }
        }
    }
}
