//! Retrain Module - per-document-type retraining pipeline

pub mod orchestrator;
pub mod outcome;

#[cfg(test)]
mod tests;

pub use orchestrator::DocumentModelRetrainer;
pub use outcome::{OutcomeKind, RetrainOutcome};
