//! Central Configuration Constants
//!
//! Single source of truth for file names and environment fallbacks.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name (also the data directory name)
pub const APP_NAME: &str = "doc-risk-retrain";

/// Performance history file (per document type)
pub const HISTORY_FILE_NAME: &str = "performance_history.json";

/// Active version pointer file (per document type)
pub const ACTIVE_POINTER_FILE_NAME: &str = "active_version";

/// Artifact directory (per document type)
pub const ARTIFACT_DIR_NAME: &str = "artifacts";

/// Retrain audit trail (per document type)
pub const AUDIT_FILE_NAME: &str = "retrain_audit.jsonl";

/// Advisory lock file (per document type)
pub const LOCK_FILE_NAME: &str = ".retrain.lock";

/// Artifact envelope format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Storage root from `RETRAIN_STORAGE_ROOT` or the local data directory
pub fn get_storage_root() -> PathBuf {
    std::env::var("RETRAIN_STORAGE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
                .join("models")
        })
}

/// Settings file path from `RETRAIN_CONFIG`, if set
pub fn get_config_path() -> Option<PathBuf> {
    std::env::var("RETRAIN_CONFIG").ok().map(PathBuf::from)
}
