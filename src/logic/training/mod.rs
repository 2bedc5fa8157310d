//! Training Module - Two-model regression ensemble
//!
//! - `scaler` - per-feature standardization
//! - `tree` - CART regression tree shared by both models
//! - `forest` / `boosting` - model A / model B
//! - `ensemble` - split, fit, score, weighted average

pub mod boosting;
pub mod ensemble;
pub mod forest;
pub mod metrics;
pub mod scaler;
pub mod tree;

#[cfg(test)]
mod tests;

pub use boosting::GradientBoosting;
pub use ensemble::{EnsembleModel, EnsembleTrainer, TrainedEnsemble};
pub use forest::RandomForest;
pub use metrics::{ModelMetrics, VersionMetrics};
pub use scaler::StandardScaler;
