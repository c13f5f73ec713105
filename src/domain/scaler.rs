//! Per-feature standardization.
//!
//! A [`ScalerState`] captures the mean and standard deviation of every
//! feature over the training table. It is fit once, persisted, and only
//! read afterwards.

use serde::{Deserialize, Serialize};

use super::patient::{FEATURE_COUNT, FEATURE_NAMES};
use crate::{LifebeatError, Result};

/// Fitted standardization statistics, one (mean, std) pair per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    mean: Vec<f64>,
    std_dev: Vec<f64>,
}

impl ScalerState {
    /// Build a state from known statistics.
    ///
    /// # Errors
    /// Returns `Data` if either vector does not hold one entry per feature.
    pub fn new(mean: Vec<f64>, std_dev: Vec<f64>) -> Result<Self> {
        if mean.len() != FEATURE_COUNT || std_dev.len() != FEATURE_COUNT {
            return Err(LifebeatError::Data(format!(
                "Scaler needs {FEATURE_COUNT} means and standard deviations, got {} and {}",
                mean.len(),
                std_dev.len()
            )));
        }
        Ok(Self { mean, std_dev })
    }

    /// Compute mean and standard deviation of each feature column.
    ///
    /// The deviation is the population form (divisor `n`). A constant
    /// column yields a zero deviation; that is reported by
    /// [`transform`](Self::transform), not here.
    ///
    /// # Errors
    /// Returns `Data` for an empty table or a row with the wrong width.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(LifebeatError::Data(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != FEATURE_COUNT)
        {
            return Err(LifebeatError::Data(format!(
                "Row {i} has {} fields, expected {FEATURE_COUNT}",
                row.len()
            )));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, value) in mean.iter_mut().zip(row) {
                *m += value;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((v, value), m) in variance.iter_mut().zip(row).zip(&mean) {
                let d = value - m;
                *v += d * d;
            }
        }
        let std_dev = variance.into_iter().map(|v| (v / n).sqrt()).collect();

        Ok(Self { mean, std_dev })
    }

    /// Standardize one vector: `(value - mean) / std` per feature.
    ///
    /// # Errors
    /// Returns `Validation` for a vector of the wrong width and `Config`
    /// if a feature has zero (or non-finite) standard deviation.
    pub fn transform(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.mean.len() {
            return Err(LifebeatError::Validation(format!(
                "Expected {} features, got {}",
                self.mean.len(),
                vector.len()
            )));
        }

        vector
            .iter()
            .zip(self.mean.iter().zip(&self.std_dev))
            .enumerate()
            .map(|(i, (value, (mean, std)))| {
                if *std == 0.0 || !std.is_finite() {
                    return Err(LifebeatError::Config(format!(
                        "Feature '{}' has zero variance in the training data",
                        FEATURE_NAMES.get(i).copied().unwrap_or("?")
                    )));
                }
                Ok((value - mean) / std)
            })
            .collect()
    }

    /// Standardize every row of a table.
    ///
    /// # Errors
    /// Same as [`transform`](Self::transform).
    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    #[must_use]
    pub fn std_dev(&self) -> &[f64] {
        &self.std_dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<f64>> {
        (0..10)
            .map(|i| {
                (0..FEATURE_COUNT)
                    .map(|j| (i * (j + 1)) as f64 + j as f64 * 0.5)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_fit_computes_column_statistics() {
        let state = ScalerState::fit(&rows()).expect("fit");
        // Column 0 is 0..10: mean 4.5, population variance 8.25.
        assert!((state.mean()[0] - 4.5).abs() < 1e-12);
        assert!((state.std_dev()[0] - 8.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_deviation_divides_by_row_count() {
        let low = vec![0.0; FEATURE_COUNT];
        let high = vec![2.0; FEATURE_COUNT];
        let state = ScalerState::fit(&[low, high]).expect("fit");
        // Divisor n gives 1.0; divisor n - 1 would give sqrt(2).
        for &std in state.std_dev() {
            assert!((std - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_transform_centers_training_rows() {
        let data = rows();
        let state = ScalerState::fit(&data).expect("fit");
        let scaled = state.transform_rows(&data).expect("transform");

        for j in 0..FEATURE_COUNT {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / scaled.len() as f64;
            let var: f64 = scaled.iter().map(|r| r[j] * r[j]).sum::<f64>() / scaled.len() as f64;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let data = rows();
        let v: Vec<f64> = (0..FEATURE_COUNT).map(|j| j as f64 * 1.7).collect();
        let a = ScalerState::fit(&data).expect("fit").transform(&v).expect("t");
        let b = ScalerState::fit(&data).expect("fit").transform(&v).expect("t");
        let a_bits: Vec<u64> = a.iter().map(|x| x.to_bits()).collect();
        let b_bits: Vec<u64> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn test_fit_rejects_empty_and_ragged_input() {
        assert!(matches!(ScalerState::fit(&[]), Err(LifebeatError::Data(_))));

        let mut data = rows();
        data[3].pop();
        assert!(matches!(ScalerState::fit(&data), Err(LifebeatError::Data(_))));
    }

    #[test]
    fn test_constant_feature_fails_at_transform_not_fit() {
        let mut data = rows();
        for row in &mut data {
            row[5] = 1.0;
        }
        let state = ScalerState::fit(&data).expect("fit only computes statistics");
        assert_eq!(state.std_dev()[5], 0.0);

        let err = state.transform(&data[0]).expect_err("zero variance");
        match err {
            LifebeatError::Config(msg) => assert!(msg.contains("fbs")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_new_checks_lengths() {
        assert!(ScalerState::new(vec![0.0; 3], vec![1.0; 3]).is_err());
        assert!(ScalerState::new(vec![0.0; FEATURE_COUNT], vec![1.0; FEATURE_COUNT]).is_ok());
    }
}
