//! Training pipeline: Offline fit-and-persist workflow.
//!
//! Steps, in order:
//! 1. Load the labeled table from the dataset source
//! 2. Fit the scaler on all feature rows and standardize them
//! 3. Split into training and held-out rows (seeded, reproducible)
//! 4. Fit the classifier on the training rows only
//! 5. Evaluate on the held-out rows and cross-validate
//! 6. Persist scaler, model and metrics as one unit
//!
//! A failure before step 6 writes nothing, and a failure inside step 6
//! restores the previous set, so previously persisted artifacts stay
//! intact either way.

use std::sync::Arc;

use crate::domain::{
    cross_validate, evaluate_holdout, feature_importance, mean, shuffle_split, ClassifierSettings,
    ClassifierState, CrossValidationScope, LabeledDataset, ScalerState, TrainingMetrics,
    DEFAULT_THRESHOLD,
};
use crate::ports::{ArtifactStore, DatasetSource, TrainedArtifacts};
use crate::{LifebeatError, Result};

/// Share of rows held out for evaluation.
pub const TEST_RATIO: f64 = 0.2;
/// Seed of the train/test shuffle.
pub const RANDOM_SEED: u64 = 62;
/// Number of cross-validation folds.
pub const CROSS_VALIDATION_FOLDS: usize = 7;

/// Parameters of one training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub test_ratio: f64,
    pub seed: u64,
    pub folds: usize,
    pub cv_scope: CrossValidationScope,
    /// Decision threshold used when scoring accuracy.
    pub threshold: f64,
    pub classifier: ClassifierSettings,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: TEST_RATIO,
            seed: RANDOM_SEED,
            folds: CROSS_VALIDATION_FOLDS,
            cv_scope: CrossValidationScope::default(),
            threshold: DEFAULT_THRESHOLD,
            classifier: ClassifierSettings::default(),
        }
    }
}

impl TrainingConfig {
    /// Reject settings no run could succeed with.
    ///
    /// # Errors
    /// Returns `Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(LifebeatError::Config(format!(
                "Test ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.folds < 2 {
            return Err(LifebeatError::Config(format!(
                "Cross-validation needs at least 2 folds, got {}",
                self.folds
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LifebeatError::Config(format!(
                "Decision threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.classifier.max_iter == 0 || !(self.classifier.c > 0.0) {
            return Err(LifebeatError::Config(
                "Classifier needs max_iter >= 1 and C > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Offline pipeline producing the scaler, model and metrics artifacts.
pub struct TrainingPipeline<D, S>
where
    D: DatasetSource,
    S: ArtifactStore,
{
    source: D,
    store: Arc<S>,
    config: TrainingConfig,
}

impl<D, S> TrainingPipeline<D, S>
where
    D: DatasetSource,
    S: ArtifactStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create a new training pipeline.
    pub fn new(source: D, store: Arc<S>, config: TrainingConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run the full pipeline and persist the artifacts.
    ///
    /// # Errors
    /// Returns `Data`/`Config` from any step, or `Storage` if persisting
    /// fails. The previous artifacts stay in place on any error.
    pub fn run(&self) -> Result<TrainingMetrics> {
        self.config.validate()?;

        tracing::info!("Looking for data at: {}", self.source.describe());
        let dataset = self.source.load()?;
        tracing::info!(
            "Data loaded: {} rows ({} positive)",
            dataset.len(),
            dataset.positives()
        );

        let artifacts = self.fit(&dataset)?;

        self.store
            .save(&artifacts)
            .map_err(|e| LifebeatError::Storage(e.into()))?;

        tracing::info!("Model accuracy:         {:.4}", artifacts.metrics.accuracy);
        tracing::info!(
            "Cross validation score: {:.4}",
            artifacts.metrics.cross_validation_score
        );
        Ok(artifacts.metrics)
    }

    /// Fit and evaluate without persisting anything.
    ///
    /// # Errors
    /// Returns `Data`/`Config` from scaling, splitting, fitting or
    /// cross-validation.
    pub fn fit(&self, dataset: &LabeledDataset) -> Result<TrainedArtifacts> {
        let config = &self.config;

        tracing::debug!("Step 1: Fitting scaler on {} rows...", dataset.len());
        let scaler = ScalerState::fit(&dataset.rows)?;
        let scaled = LabeledDataset::new(
            scaler.transform_rows(&dataset.rows)?,
            dataset.labels.clone(),
        )?;

        tracing::debug!(
            "Step 2: Splitting (test_ratio={}, seed={})...",
            config.test_ratio,
            config.seed
        );
        let (train_idx, test_idx) = shuffle_split(scaled.len(), config.test_ratio, config.seed)?;
        let train = scaled.subset(&train_idx);
        let test = scaled.subset(&test_idx);

        tracing::debug!("Step 3: Fitting classifier on {} rows...", train.len());
        let outcome = ClassifierState::fit_detailed(&train.rows, &train.labels, &config.classifier)?;

        tracing::debug!("Step 4: Evaluating on {} held-out rows...", test.len());
        let holdout = evaluate_holdout(&outcome.state, &test, config.threshold)?;

        let cv_data = match config.cv_scope {
            CrossValidationScope::TrainingSplit => &train,
            CrossValidationScope::HoldoutSplit => &test,
        };
        tracing::debug!(
            "Step 5: {}-fold cross-validation on the {}...",
            config.folds,
            config.cv_scope
        );
        let cv_scores = cross_validate(cv_data, config.folds, &config.classifier, config.threshold)?;

        let confusion = holdout.confusion;
        let metrics = TrainingMetrics {
            accuracy: confusion.accuracy(),
            cross_validation_score: mean(&cv_scores),
            cross_validation_folds: config.folds,
            cross_validation_scope: config.cv_scope,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1_score: confusion.f1(),
            roc_auc: holdout.roc_auc,
            confusion_matrix: confusion,
            feature_importance: feature_importance(&outcome.state),
            train_samples: train.len(),
            test_samples: test.len(),
            seed: config.seed,
            iterations: outcome.iterations,
            converged: outcome.converged,
            trained_at: chrono::Utc::now(),
        };

        Ok(TrainedArtifacts {
            scaler,
            classifier: outcome.state,
            metrics,
        })
    }
}
