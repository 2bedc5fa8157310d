//! Gradient Boosting - squared-loss boosted trees (model B)
//!
//! Starts from the target mean; each stage fits a shallow tree to the
//! current residuals on a row subsample and adds it scaled by the learning
//! rate.

use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::logic::config::BoostingParams;
use crate::logic::error::{RetrainError, RetrainResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub init: f64,
    pub learning_rate: f64,
    pub stages: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        params: &BoostingParams,
        seed: u64,
    ) -> RetrainResult<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(RetrainError::training(format!(
                "gradient boosting needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }

        let init = y.iter().sum::<f64>() / n as f64;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2 * params.min_samples_leaf.max(1),
            min_samples_leaf: params.min_samples_leaf,
            max_features: usize::MAX,
        };
        let per_stage = ((params.subsample * n as f64).round() as usize).clamp(1, n);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = vec![init; n];
        let mut residual = vec![0.0; n];
        let mut stages = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            for i in 0..n {
                residual[i] = y[i] - current[i];
            }
            let rows: Vec<usize> = if per_stage == n {
                (0..n).collect()
            } else {
                rand::seq::index::sample(&mut rng, n, per_stage).into_vec()
            };
            let tree = RegressionTree::fit(x, &residual, &rows, &tree_params, &mut rng);
            for (i, row) in x.rows().into_iter().enumerate() {
                current[i] += params.learning_rate * tree.predict_row(row);
            }
            stages.push(tree);
        }

        log::debug!("Fitted gradient boosting: {} stages, {} rows/stage", stages.len(), per_stage);
        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.init
                    + self
                        .stages
                        .iter()
                        .map(|t| self.learning_rate * t.predict_row(row))
                        .sum::<f64>()
            })
            .collect()
    }
}
