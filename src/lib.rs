//! Document Risk Retraining Core
//!
//! Keeps per-document-type fraud-risk models current as labeled data
//! accumulates, without ever letting a worse model replace the active one.

pub mod api;
pub mod constants;
pub mod logic;

pub use logic::config::{RetrainConfig, RetrainSettings};
pub use logic::error::{RetrainError, RetrainResult};
pub use logic::retrain::{DocumentModelRetrainer, OutcomeKind, RetrainOutcome};
