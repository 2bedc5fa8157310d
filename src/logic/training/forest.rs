//! Random Forest - bagged regression trees (model A)

use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::logic::config::ForestParams;
use crate::logic::error::{RetrainError, RetrainResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        params: &ForestParams,
        seed: u64,
    ) -> RetrainResult<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(RetrainError::training(format!(
                "random forest needs matching non-empty inputs, got {} rows and {} targets",
                n,
                y.len()
            )));
        }

        let p = x.ncols();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: ((params.max_features * p as f64).ceil() as usize).clamp(1, p.max(1)),
        };

        let mut master = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.gen());
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(x, y, &bootstrap, &tree_params, &mut rng));
        }

        log::debug!("Fitted random forest: {} trees, {} features/split", trees.len(), tree_params.max_features);
        Ok(Self { trees })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        if self.trees.is_empty() {
            return Array1::zeros(x.nrows());
        }
        let k = self.trees.len() as f64;
        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / k)
            .collect()
    }
}
