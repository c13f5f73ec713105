//! Domain layer: Core business types and numerical algorithms.
//!
//! Pure Rust types and functions: feature standardization, logistic
//! regression, dataset partitioning and evaluation. Nothing here touches
//! the filesystem.

mod assessment;
mod classifier;
mod dataset;
mod evaluation;
mod patient;
mod scaler;

pub use classifier::{sigmoid, ClassifierSettings, ClassifierState, FitOutcome, DEFAULT_THRESHOLD};
pub use dataset::{shuffle_split, stratified_k_fold, LabeledDataset};
pub use assessment::{RiskAssessment, RiskLevel};
pub use evaluation::{
    cross_validate, evaluate_holdout, feature_importance, mean, roc_auc, ConfusionMatrix,
    CrossValidationScope, HoldoutEvaluation, TrainingMetrics,
};
pub use patient::{feature_index, PatientFeatures, FEATURE_COUNT, FEATURE_NAMES, OUTCOME_COLUMN};
pub use scaler::ScalerState;
