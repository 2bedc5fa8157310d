//! Error Types - Retraining Engine
//!
//! One error enum for every fallible stage of the pipeline. The orchestrator
//! folds these into a structured `RetrainOutcome` instead of propagating them
//! to the scheduler.

use std::path::PathBuf;

pub type RetrainResult<T> = Result<T, RetrainError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrainError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schema mismatch: expected {expected} (hash {expected_hash:08x}), got {actual} (hash {actual_hash:08x})")]
    SchemaMismatch {
        expected: String,
        expected_hash: u32,
        actual: String,
        actual_hash: u32,
    },

    #[error("Data quality check failed: {0}")]
    DataQuality(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Persistence failed at {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Version {0} not found in history")]
    VersionNotFound(String),

    #[error("Artifact integrity check failed for {path}: {reason}")]
    ArtifactIntegrity { path: PathBuf, reason: String },

    #[error("Activation of {version_id} failed and history could not be restored: {reason}")]
    ActivationIncomplete { version_id: String, reason: String },

    #[error("Retrain lock for '{document_type}' is held by {owner}")]
    LockHeld { document_type: String, owner: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid document type key: '{0}'")]
    InvalidDocumentType(String),
}

impl RetrainError {
    pub fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        RetrainError::Persistence {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn training(msg: impl Into<String>) -> Self {
        RetrainError::Training(msg.into())
    }
}
