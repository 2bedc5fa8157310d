//! Versioning Module - Model History, Artifacts & Promotion
//!
//! Goal: never replace the serving model with a worse one.
//!
//! - `store.rs`: per-document-type files (history, pointer, artifacts)
//! - `tracker.rs`: promote / reject, activate, prune, rollback
//! - `lock.rs`: single-writer advisory lock
//! - `audit.rs`: JSONL audit trail

pub mod audit;
pub mod lock;
pub mod store;
pub mod tracker;
pub mod types;


pub use audit::{AuditAction, AuditLog, AuditLogEntry};
pub use lock::RetrainLock;
pub use store::VersionStore;
pub use tracker::{ModelBundle, PerformanceTracker, VERSION_ID_FORMAT};
pub use types::{
    ActivationDecision, ArtifactRole, ModelVersion, PerformanceSummary, TrainingDataInfo,
    VersionSummary,
};
