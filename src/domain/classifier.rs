//! Binary logistic regression over standardized features.
//!
//! Fitting minimizes the L2-regularized negative log-likelihood
//!
//! ```text
//! J(w, b) = C * sum_i [ log(1 + exp(z_i)) - y_i * z_i ] + ||w||^2 / 2,   z_i = w.x_i + b
//! ```
//!
//! with a damped Newton (IRLS) iteration. The intercept is not penalized.
//! The problem is strictly convex, so the iteration cap only bounds runtime.

use serde::{Deserialize, Serialize};

use super::patient::FEATURE_COUNT;
use crate::{LifebeatError, Result};

/// Default decision threshold on the positive-class probability.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Optimizer settings for [`ClassifierState::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Inverse regularization strength (larger = weaker L2 penalty).
    pub c: f64,
    /// Maximum number of Newton iterations.
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this value.
    pub tolerance: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tolerance: 1e-8,
        }
    }
}

/// Learned weights and intercept of the logistic decision function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierState {
    weights: Vec<f64>,
    bias: f64,
}

/// A fitted classifier plus optimizer diagnostics.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub state: ClassifierState,
    pub iterations: usize,
    pub converged: bool,
}

impl ClassifierState {
    /// Build a state from known coefficients.
    ///
    /// # Errors
    /// Returns `Data` if there is not one weight per feature or a
    /// coefficient is not finite.
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self> {
        if weights.len() != FEATURE_COUNT {
            return Err(LifebeatError::Data(format!(
                "Classifier needs {FEATURE_COUNT} weights, got {}",
                weights.len()
            )));
        }
        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(LifebeatError::Data(
                "Classifier coefficients must be finite".to_string(),
            ));
        }
        Ok(Self { weights, bias })
    }

    /// Fit on scaled rows and 0/1 labels.
    ///
    /// # Errors
    /// See [`fit_detailed`](Self::fit_detailed).
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], settings: &ClassifierSettings) -> Result<Self> {
        Self::fit_detailed(rows, labels, settings).map(|outcome| outcome.state)
    }

    /// Fit and report how the optimizer finished.
    ///
    /// # Errors
    /// Returns `Data` for mismatched row/label counts, labels outside
    /// {0, 1}, rows of the wrong width, non-finite values, or a single
    /// class. Returns `Config` for unusable settings.
    pub fn fit_detailed(
        rows: &[Vec<f64>],
        labels: &[u8],
        settings: &ClassifierSettings,
    ) -> Result<FitOutcome> {
        validate_training_input(rows, labels)?;
        if !(settings.c > 0.0 && settings.c.is_finite()) {
            return Err(LifebeatError::Config(format!(
                "Regularization parameter C must be positive, got {}",
                settings.c
            )));
        }
        if settings.max_iter == 0 {
            return Err(LifebeatError::Config(
                "max_iter must be at least 1".to_string(),
            ));
        }

        let targets: Vec<f64> = labels.iter().map(|&y| f64::from(y)).collect();
        let dim = FEATURE_COUNT + 1;
        // Parameters: weights followed by the intercept.
        let mut theta = vec![0.0; dim];
        let mut loss = objective(&theta, rows, &targets, settings.c);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < settings.max_iter {
            iterations += 1;
            let (gradient, hessian) = gradient_and_hessian(&theta, rows, &targets, settings.c);
            if max_abs(&gradient) <= settings.tolerance {
                converged = true;
                break;
            }

            let step = solve_spd(hessian, &gradient).ok_or_else(|| {
                LifebeatError::Config("Hessian is not positive definite".to_string())
            })?;
            let decrease: f64 = gradient.iter().zip(&step).map(|(g, s)| g * s).sum();

            // Backtracking line search (Armijo condition). Near the optimum
            // the expected decrease drops below the rounding error of the
            // loss itself, so allow that much slack.
            let slack = 1e-12 * loss.abs().max(1.0);
            let mut t = 1.0;
            let mut accepted = None;
            for _ in 0..50 {
                let candidate: Vec<f64> = theta
                    .iter()
                    .zip(&step)
                    .map(|(th, s)| th - t * s)
                    .collect();
                let candidate_loss = objective(&candidate, rows, &targets, settings.c);
                if candidate_loss <= loss - 1e-4 * t * decrease + slack {
                    accepted = Some((candidate, candidate_loss));
                    break;
                }
                t *= 0.5;
            }

            let Some((next, next_loss)) = accepted else {
                break;
            };
            let moved = max_abs(&step) * t;
            theta = next;
            loss = next_loss;
            if moved < 1e-15 {
                break;
            }
        }

        if !converged {
            tracing::warn!(
                "Logistic regression stopped after {} iterations without reaching tolerance {}",
                iterations,
                settings.tolerance
            );
        }
        tracing::debug!(
            "Logistic regression finished after {} iterations (loss={:.6})",
            iterations,
            loss
        );

        let bias = theta.pop().unwrap_or(0.0);
        Ok(FitOutcome {
            state: Self {
                weights: theta,
                bias,
            },
            iterations,
            converged,
        })
    }

    /// Linear score `w.x + b`.
    ///
    /// # Errors
    /// Returns `Validation` if `scaled` has the wrong width.
    pub fn decision_function(&self, scaled: &[f64]) -> Result<f64> {
        if scaled.len() != self.weights.len() {
            return Err(LifebeatError::Validation(format!(
                "Expected {} scaled features, got {}",
                self.weights.len(),
                scaled.len()
            )));
        }
        Ok(dot(&self.weights, scaled) + self.bias)
    }

    /// Probability of the positive (heart-attack) class.
    ///
    /// # Errors
    /// Returns `Validation` if `scaled` has the wrong width.
    pub fn predict_probability(&self, scaled: &[f64]) -> Result<f64> {
        self.decision_function(scaled).map(sigmoid)
    }

    /// Threshold the positive-class probability.
    ///
    /// # Errors
    /// Returns `Config` for a threshold outside [0, 1], otherwise as
    /// [`predict_probability`](Self::predict_probability).
    pub fn predict_label(&self, scaled: &[f64], threshold: f64) -> Result<u8> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LifebeatError::Config(format!(
                "Decision threshold {threshold} outside [0, 1]"
            )));
        }
        let probability = self.predict_probability(scaled)?;
        Ok(u8::from(probability >= threshold))
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn bias(&self) -> f64 {
        self.bias
    }
}

fn validate_training_input(rows: &[Vec<f64>], labels: &[u8]) -> Result<()> {
    if rows.len() != labels.len() {
        return Err(LifebeatError::Data(format!(
            "Row/label count mismatch: {} rows, {} labels",
            rows.len(),
            labels.len()
        )));
    }
    if rows.is_empty() {
        return Err(LifebeatError::Data(
            "Cannot fit classifier on zero rows".to_string(),
        ));
    }
    if let Some(bad) = labels.iter().find(|&&y| y > 1) {
        return Err(LifebeatError::Data(format!(
            "Labels must be 0 or 1, found {bad}"
        )));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != FEATURE_COUNT {
            return Err(LifebeatError::Data(format!(
                "Row {i} has {} fields, expected {FEATURE_COUNT}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(LifebeatError::Data(format!(
                "Row {i} contains a non-finite value"
            )));
        }
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(LifebeatError::Data(
            "Training labels contain a single class".to_string(),
        ));
    }
    Ok(())
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

/// `log(1 + exp(z))` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn linear(theta: &[f64], row: &[f64]) -> f64 {
    let (weights, bias) = theta.split_at(theta.len() - 1);
    dot(weights, row) + bias[0]
}

fn objective(theta: &[f64], rows: &[Vec<f64>], targets: &[f64], c: f64) -> f64 {
    let data_term: f64 = rows
        .iter()
        .zip(targets)
        .map(|(row, y)| {
            let z = linear(theta, row);
            softplus(z) - y * z
        })
        .sum();
    let penalty: f64 = theta[..theta.len() - 1].iter().map(|w| w * w).sum();
    c * data_term + 0.5 * penalty
}

fn gradient_and_hessian(
    theta: &[f64],
    rows: &[Vec<f64>],
    targets: &[f64],
    c: f64,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let dim = theta.len();
    let n_weights = dim - 1;
    let mut gradient = vec![0.0; dim];
    let mut hessian = vec![vec![0.0; dim]; dim];

    for (row, y) in rows.iter().zip(targets) {
        let p = sigmoid(linear(theta, row));
        let residual = c * (p - y);
        let curvature = c * p * (1.0 - p);

        for a in 0..dim {
            let xa = if a < n_weights { row[a] } else { 1.0 };
            gradient[a] += residual * xa;
            for b in 0..=a {
                let xb = if b < n_weights { row[b] } else { 1.0 };
                hessian[a][b] += curvature * xa * xb;
            }
        }
    }

    for a in 0..dim {
        if a < n_weights {
            gradient[a] += theta[a];
            hessian[a][a] += 1.0;
        } else {
            hessian[a][a] += 1e-10;
        }
        for b in 0..a {
            hessian[b][a] = hessian[a][b];
        }
    }

    (gradient, hessian)
}

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky.
fn solve_spd(mut a: Vec<Vec<f64>>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    for j in 0..n {
        let mut diag = a[j][j];
        for k in 0..j {
            diag -= a[j][k] * a[j][k];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        a[j][j] = diag;
        for i in (j + 1)..n {
            let mut value = a[i][j];
            for k in 0..j {
                value -= a[i][k] * a[j][k];
            }
            a[i][j] = value / diag;
        }
    }

    // Forward substitution: L y = b.
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut value = b[i];
        for k in 0..i {
            value -= a[i][k] * y[k];
        }
        y[i] = value / a[i][i];
    }
    // Back substitution: L^T x = y.
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut value = y[i];
        for k in (i + 1)..n {
            value -= a[k][i] * x[k];
        }
        x[i] = value / a[i][i];
    }
    Some(x)
}

fn dot(weights: &[f64], features: &[f64]) -> f64 {
    weights
        .iter()
        .zip(features.iter())
        .map(|(w, f)| w * f)
        .sum()
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}
