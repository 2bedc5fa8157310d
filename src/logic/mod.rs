//! Logic Module - Business Logic & Engines
//!
//! - `features/` - feature schemas, labeled tables
//! - `providers/` - real and synthetic data sources
//! - `dataset/` - blending and the quality gate
//! - `training/` - scaler, tree models, ensemble
//! - `versioning/` - history, artifacts, promotion, rollback
//! - `retrain/` - the per-document-type pipeline

pub mod config;
pub mod error;

pub mod dataset;
pub mod features;
pub mod providers;
pub mod retrain;
pub mod training;
pub mod versioning;
