//! Metrics - held-out split and regression scores

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::config::EnsembleWeights;
use crate::logic::error::{RetrainError, RetrainResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: f64,
    pub r2_score: f64,
}

impl ModelMetrics {
    pub fn score(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            mse: mse(y_true, y_pred),
            r2_score: r2_score(y_true, y_pred),
        }
    }
}

/// Metrics recorded for one trained version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetrics {
    /// Ensemble R² on the held-out partition
    pub r2_score: f64,
    pub mse: f64,
    pub model_a: ModelMetrics,
    pub model_b: ModelMetrics,
    pub ensemble_weights: EnsembleWeights,
    pub training_time_secs: f64,
    pub train_size: usize,
    pub test_size: usize,
}

impl VersionMetrics {
    pub fn is_finite(&self) -> bool {
        [
            self.r2_score,
            self.mse,
            self.model_a.r2_score,
            self.model_a.mse,
            self.model_b.r2_score,
            self.model_b.mse,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Seeded shuffle split into (train, test) row indices
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> RetrainResult<(Vec<usize>, Vec<usize>)> {
    // Tolerance keeps e.g. 400 * 0.2 from rounding up to 81
    let n_test = (n as f64 * test_fraction - 1e-9).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(RetrainError::training(format!(
            "cannot split {} rows with test fraction {} into two non-empty partitions",
            n, test_fraction
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}
