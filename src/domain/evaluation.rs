//! Model evaluation: holdout scores, cross-validation and the persisted
//! metrics record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::classifier::{ClassifierSettings, ClassifierState};
use super::dataset::{stratified_k_fold, LabeledDataset};
use super::patient::FEATURE_NAMES;
use crate::{LifebeatError, Result};

/// Which split the cross-validation score is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossValidationScope {
    /// Cross-validate on the training split only.
    #[default]
    TrainingSplit,
    /// Cross-validate on the held-out split (legacy metric reproduction).
    HoldoutSplit,
}

impl std::fmt::Display for CrossValidationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrainingSplit => write!(f, "training split"),
            Self::HoldoutSplit => write!(f, "holdout split"),
        }
    }
}

/// Binary confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against ground truth.
    #[must_use]
    pub fn from_predictions(truth: &[u8], predicted: &[u8]) -> Self {
        let mut m = Self::default();
        for (&y, &p) in truth.iter().zip(predicted) {
            match (y, p) {
                (0, 0) => m.true_negative += 1,
                (0, _) => m.false_positive += 1,
                (_, 0) => m.false_negative += 1,
                _ => m.true_positive += 1,
            }
        }
        m
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    #[must_use]
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Zero when the denominator is zero.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Durable record of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Holdout accuracy
    pub accuracy: f64,
    /// Mean accuracy over the cross-validation folds
    pub cross_validation_score: f64,
    pub cross_validation_folds: usize,
    pub cross_validation_scope: CrossValidationScope,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Area under the ROC curve on the holdout split (`None` if it holds one class)
    pub roc_auc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
    /// |weight| share per feature
    pub feature_importance: BTreeMap<String, f64>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub seed: u64,
    pub iterations: usize,
    pub converged: bool,
    pub trained_at: chrono::DateTime<chrono::Utc>,
}

/// Holdout scores of a fitted classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutEvaluation {
    pub confusion: ConfusionMatrix,
    pub roc_auc: Option<f64>,
}

/// Score a classifier on already-scaled rows.
///
/// # Errors
/// Returns `Data` for an empty split, otherwise propagates prediction errors.
pub fn evaluate_holdout(
    state: &ClassifierState,
    holdout: &LabeledDataset,
    threshold: f64,
) -> Result<HoldoutEvaluation> {
    if holdout.is_empty() {
        return Err(LifebeatError::Data(
            "Cannot evaluate on an empty split".to_string(),
        ));
    }
    let probabilities = holdout
        .rows
        .iter()
        .map(|row| state.predict_probability(row))
        .collect::<Result<Vec<_>>>()?;
    let predicted: Vec<u8> = probabilities
        .iter()
        .map(|&p| u8::from(p >= threshold))
        .collect();

    Ok(HoldoutEvaluation {
        confusion: ConfusionMatrix::from_predictions(&holdout.labels, &predicted),
        roc_auc: roc_auc(&holdout.labels, &probabilities),
    })
}

/// Rank-based ROC AUC (Mann-Whitney U) with average ranks for ties.
#[must_use]
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the average rank.
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum += average_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let u = rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

/// Accuracy of a fresh classifier on each stratified fold of `data`.
///
/// # Errors
/// Propagates fold construction and fitting errors.
pub fn cross_validate(
    data: &LabeledDataset,
    folds: usize,
    settings: &ClassifierSettings,
    threshold: f64,
) -> Result<Vec<f64>> {
    let partitions = stratified_k_fold(&data.labels, folds)?;
    let mut scores = Vec::with_capacity(folds);

    for (f, held_out) in partitions.iter().enumerate() {
        let mut in_fold = vec![false; data.len()];
        for &i in held_out {
            in_fold[i] = true;
        }
        let train_idx: Vec<usize> = (0..data.len()).filter(|&i| !in_fold[i]).collect();

        let train = data.subset(&train_idx);
        let test = data.subset(held_out);
        let state = ClassifierState::fit(&train.rows, &train.labels, settings)?;
        let accuracy = evaluate_holdout(&state, &test, threshold)?.confusion.accuracy();
        tracing::debug!("Fold {}/{}: accuracy={:.4}", f + 1, folds, accuracy);
        scores.push(accuracy);
    }

    Ok(scores)
}

/// Normalized absolute weights keyed by feature name.
#[must_use]
pub fn feature_importance(state: &ClassifierState) -> BTreeMap<String, f64> {
    let total: f64 = state.weights().iter().map(|w| w.abs()).sum();
    FEATURE_NAMES
        .iter()
        .zip(state.weights())
        .map(|(name, w)| {
            let share = if total > 0.0 { w.abs() / total } else { 0.0 };
            ((*name).to_string(), share)
        })
        .collect()
}

/// Arithmetic mean, zero for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patient::FEATURE_COUNT;

    #[test]
    fn test_confusion_matrix_scores() {
        let truth = [1, 1, 1, 0, 0, 0, 0, 1];
        let predicted = [1, 1, 0, 0, 0, 1, 0, 1];
        let m = ConfusionMatrix::from_predictions(&truth, &predicted);
        assert_eq!(m.true_positive, 3);
        assert_eq!(m.false_negative, 1);
        assert_eq!(m.false_positive, 1);
        assert_eq!(m.true_negative, 3);
        assert!((m.accuracy() - 0.75).abs() < 1e-12);
        assert!((m.precision() - 0.75).abs() < 1e-12);
        assert!((m.recall() - 0.75).abs() < 1e-12);
        assert!((m.f1() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_empty_confusion_matrix_does_not_divide_by_zero() {
        let m = ConfusionMatrix::default();
        assert_eq!(m.accuracy(), 0.0);
        assert_eq!(m.f1(), 0.0);
    }

    #[test]
    fn test_roc_auc() {
        assert_eq!(roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]), Some(0.0));
        assert_eq!(roc_auc(&[0, 1], &[0.5, 0.5]), Some(0.5));
        assert_eq!(roc_auc(&[1, 1], &[0.5, 0.6]), None);
        // One of four positive/negative pairs is misordered.
        let auc = roc_auc(&[0, 1, 0, 1], &[0.1, 0.3, 0.4, 0.8]).expect("auc");
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_feature_importance_sums_to_one() {
        let mut weights = vec![0.0; FEATURE_COUNT];
        weights[0] = 1.0;
        weights[2] = -3.0;
        let state = ClassifierState::new(weights, 0.2).expect("state");
        let importance = feature_importance(&state);
        assert_eq!(importance.len(), FEATURE_COUNT);
        assert!((importance["age"] - 0.25).abs() < 1e-12);
        assert!((importance["cp"] - 0.75).abs() < 1e-12);
        assert!((importance.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_json_shape() {
        let metrics = TrainingMetrics {
            accuracy: 0.8,
            cross_validation_score: 0.78,
            cross_validation_folds: 7,
            cross_validation_scope: CrossValidationScope::TrainingSplit,
            precision: 0.8,
            recall: 0.9,
            f1_score: 0.85,
            roc_auc: Some(0.9),
            confusion_matrix: ConfusionMatrix::default(),
            feature_importance: BTreeMap::new(),
            train_samples: 242,
            test_samples: 61,
            seed: 62,
            iterations: 7,
            converged: true,
            trained_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&metrics).expect("json");
        assert_eq!(value["cross_validation_scope"], "training_split");
        assert!(value["accuracy"].is_number());
        assert!(value["cross_validation_score"].is_number());
    }
}
