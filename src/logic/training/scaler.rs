//! Standard Scaler - zero mean, unit variance per feature
//!
//! Fitted on the training partition only; the held-out partition and every
//! later prediction reuse the fitted statistics.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::logic::error::{RetrainError, RetrainResult};

const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> RetrainResult<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RetrainError::training("cannot fit scaler on an empty partition"))?;
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std
            .iter()
            .map(|&s| if s.is_finite() && s > MIN_STD { s } else { 1.0 })
            .collect();
        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> RetrainResult<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(RetrainError::training(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((&x - &mean) / &scale)
    }
}
