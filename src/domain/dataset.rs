//! Labeled training table and the index partitions used for evaluation.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::patient::FEATURE_COUNT;
use crate::{LifebeatError, Result};

/// Feature rows (model order) with their 0/1 outcome labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl LabeledDataset {
    /// Build a dataset, checking shape and label domain.
    ///
    /// # Errors
    /// Returns `Data` on count mismatch, wrong row width or a label
    /// outside {0, 1}.
    pub fn new(rows: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(LifebeatError::Data(format!(
                "Row/label count mismatch: {} rows, {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != FEATURE_COUNT) {
            return Err(LifebeatError::Data(format!(
                "Expected {FEATURE_COUNT} features per row, got {}",
                row.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&y| y > 1) {
            return Err(LifebeatError::Data(format!(
                "Labels must be 0 or 1, found {bad}"
            )));
        }
        Ok(Self { rows, labels })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows labeled 1.
    #[must_use]
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y == 1).count()
    }

    /// Copy out the rows at `indices`, in that order.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Shuffle `0..n` with a seeded ChaCha RNG and cut off a test tail.
///
/// The test share is `ceil(n * test_ratio)`. The same `n`, ratio and seed
/// always produce the same partition.
///
/// # Errors
/// Returns `Config` for a ratio outside (0, 1) and `Data` if either side
/// would be empty.
pub fn shuffle_split(n: usize, test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(LifebeatError::Config(format!(
            "Test ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    let test_len = ((n as f64) * test_ratio).ceil() as usize;
    if test_len == 0 || test_len >= n {
        return Err(LifebeatError::Data(format!(
            "Cannot split {n} rows with test ratio {test_ratio}"
        )));
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let test = indices.split_off(n - test_len);
    Ok((indices, test))
}

/// Stratified, unshuffled k-fold partition of `labels`.
///
/// Each class keeps its original order and is cut into `k` contiguous
/// chunks whose sizes differ by at most one; fold `f` is the union of
/// chunk `f` from every class. Returns the held-out indices per fold.
///
/// # Errors
/// Returns `Config` if `k < 2` and `Data` if there are fewer rows than folds.
pub fn stratified_k_fold(labels: &[u8], k: usize) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(LifebeatError::Config(format!(
            "Cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if labels.len() < k {
        return Err(LifebeatError::Data(format!(
            "Cannot build {k} folds from {} rows",
            labels.len()
        )));
    }

    let mut folds = vec![Vec::new(); k];
    for class in [0u8, 1u8] {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &y)| y == class)
            .map(|(i, _)| i)
            .collect();
        let base = members.len() / k;
        let extra = members.len() % k;
        let mut start = 0;
        for (f, fold) in folds.iter_mut().enumerate() {
            let size = base + usize::from(f < extra);
            fold.extend_from_slice(&members[start..start + size]);
            start += size;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}
