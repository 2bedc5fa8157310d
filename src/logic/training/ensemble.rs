//! Ensemble Trainer - scaler + two tree models + held-out metrics
//!
//! Both models see the same scaled training partition. The ensemble score is
//! a fixed weighted average of the two, clamped to the risk range.

use std::time::Instant;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::boosting::GradientBoosting;
use super::forest::RandomForest;
use super::metrics::{train_test_split, ModelMetrics, VersionMetrics};
use super::scaler::StandardScaler;
use crate::logic::config::{BoostingParams, EnsembleWeights, ForestParams, RetrainConfig};
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::table::{RISK_MAX, RISK_MIN};
use crate::logic::features::FeatureTable;

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleModel {
    pub scaler: StandardScaler,
    pub model_a: RandomForest,
    pub model_b: GradientBoosting,
    pub weights: EnsembleWeights,
}

impl EnsembleModel {
    /// Risk scores for raw (unscaled) feature rows
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> RetrainResult<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        let a = self.model_a.predict(scaled.view());
        let b = self.model_b.predict(scaled.view());
        Ok(combine(&a, &b, &self.weights))
    }
}

fn combine(a: &Array1<f64>, b: &Array1<f64>, weights: &EnsembleWeights) -> Array1<f64> {
    let (wa, wb) = weights.normalized();
    (a * wa + b * wb).mapv(|v| v.clamp(RISK_MIN, RISK_MAX))
}

#[derive(Debug, Clone)]
pub struct TrainedEnsemble {
    pub model: EnsembleModel,
    pub metrics: VersionMetrics,
}

// ============================================================================
// TRAINER
// ============================================================================

pub struct EnsembleTrainer {
    forest: ForestParams,
    boosting: BoostingParams,
    weights: EnsembleWeights,
    test_fraction: f64,
    seed: u64,
}

impl EnsembleTrainer {
    pub fn from_config(config: &RetrainConfig) -> Self {
        Self {
            forest: config.forest.clone(),
            boosting: config.boosting.clone(),
            weights: config.ensemble_weights,
            test_fraction: config.test_fraction,
            seed: config.random_seed,
        }
    }

    pub fn train(&self, table: &FeatureTable) -> RetrainResult<TrainedEnsemble> {
        let started = Instant::now();

        let risk = table
            .risk()
            .ok_or_else(|| RetrainError::training("table has no target column"))?;
        if table.has_non_finite_features() || risk.iter().any(|r| !r.is_finite()) {
            return Err(RetrainError::training("table contains non-finite values"));
        }

        let (train_idx, test_idx) = train_test_split(table.n_rows(), self.test_fraction, self.seed)?;
        let train = table.select_rows(&train_idx);
        let test = table.select_rows(&test_idx);
        let y_train: Vec<f64> = train_idx.iter().map(|&i| risk[i]).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| risk[i]).collect();

        let scaler = StandardScaler::fit(train.features())?;
        let x_train = scaler.transform(train.features())?;
        let x_test = scaler.transform(test.features())?;

        let model_a = RandomForest::fit(x_train.view(), &y_train, &self.forest, self.seed)?;
        let model_b = GradientBoosting::fit(x_train.view(), &y_train, &self.boosting, self.seed.wrapping_add(1))?;

        let pred_a = model_a.predict(x_test.view());
        let pred_b = model_b.predict(x_test.view());
        if pred_a.iter().chain(pred_b.iter()).any(|p| !p.is_finite()) {
            return Err(RetrainError::training("model produced a non-finite prediction"));
        }
        let pred = combine(&pred_a, &pred_b, &self.weights);

        let a = ModelMetrics::score(&y_test, &pred_a.to_vec());
        let b = ModelMetrics::score(&y_test, &pred_b.to_vec());
        let ensemble = ModelMetrics::score(&y_test, &pred.to_vec());

        let metrics = VersionMetrics {
            r2_score: ensemble.r2_score,
            mse: ensemble.mse,
            model_a: a,
            model_b: b,
            ensemble_weights: self.weights,
            training_time_secs: started.elapsed().as_secs_f64(),
            train_size: train_idx.len(),
            test_size: test_idx.len(),
        };
        if !metrics.is_finite() {
            return Err(RetrainError::training("metrics are not finite"));
        }

        log::debug!(
            "Model A: R²={:.4} MSE={:.2}; Model B: R²={:.4} MSE={:.2}",
            a.r2_score,
            a.mse,
            b.r2_score,
            b.mse
        );
        log::info!(
            "Trained {} ensemble on {} rows: R²={:.4} MSE={:.2} ({:.2}s)",
            table.schema().document_type,
            table.n_rows(),
            metrics.r2_score,
            metrics.mse,
            metrics.training_time_secs
        );

        Ok(TrainedEnsemble {
            model: EnsembleModel {
                scaler,
                model_a,
                model_b,
                weights: self.weights,
            },
            metrics,
        })
    }
}
