//! API Commands - entry points for schedulers and the CLI
//!
//! Each command opens what it needs from `RetrainSettings`, runs one
//! operation, and returns a serializable result. Errors cross this boundary
//! as strings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logic::config::RetrainSettings;
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::{DocumentKind, LayoutInfo};
use crate::logic::providers::{JsonlRealDataProvider, NoRealData, RealDataProvider};
use crate::logic::retrain::{DocumentModelRetrainer, RetrainOutcome};
use crate::logic::versioning::{PerformanceSummary, PerformanceTracker, RetrainLock, VersionStore};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Where labeled real rows come from for a retrain run
#[derive(Debug, Clone, Default)]
pub struct RealDataSource {
    /// JSONL export of the operational store; `None` means no real data
    pub path: Option<PathBuf>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub document_type: String,
    pub previous_active: Option<String>,
    pub active_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    pub document_type: String,
    pub keep_n: usize,
    pub pruned: Vec<String>,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub document_type: String,
    pub active_version: Option<String>,
    pub artifacts_ok: bool,
    pub error: Option<String>,
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Settings file (explicit path, else `RETRAIN_CONFIG`, else defaults),
/// with an optional storage root override
pub fn load_settings(config_path: Option<&Path>, storage_root: Option<PathBuf>) -> Result<RetrainSettings, String> {
    let env_path = crate::constants::get_config_path();
    let path = config_path.or(env_path.as_deref());
    let mut settings = RetrainSettings::load_or_default(path).map_err(|e| e.to_string())?;
    if let Some(root) = storage_root {
        settings.storage_root = root;
    }
    Ok(settings)
}

/// Built-in document types and their feature layouts
pub fn list_document_types() -> Vec<LayoutInfo> {
    DocumentKind::ALL.iter().map(|k| k.schema().info()).collect()
}

fn kind_for(document_type: &str) -> RetrainResult<DocumentKind> {
    DocumentKind::from_key(document_type)
        .ok_or_else(|| RetrainError::InvalidDocumentType(document_type.to_string()))
}

/// Single-writer lock shared with `retrain`; held by every command that
/// rewrites history or the pointer
fn lock_document_type(settings: &RetrainSettings, document_type: &str) -> RetrainResult<RetrainLock> {
    let stale_after = settings.for_document_type(document_type).lock_stale_after_secs;
    VersionStore::lock(&settings.storage_root, document_type, Duration::from_secs(stale_after))
}

fn open_tracker(settings: &RetrainSettings, document_type: &str) -> RetrainResult<PerformanceTracker> {
    PerformanceTracker::open(
        &settings.storage_root,
        document_type,
        settings.for_document_type(document_type),
    )
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Run one retrain cycle for a built-in document type
pub fn retrain(settings: &RetrainSettings, document_type: &str, real: &RealDataSource) -> Result<RetrainOutcome, String> {
    let kind = kind_for(document_type).map_err(|e| e.to_string())?;
    let config = settings.for_document_type(document_type).clone();

    let provider: Box<dyn RealDataProvider> = match &real.path {
        Some(path) => {
            let mut p = JsonlRealDataProvider::new(path, kind.schema());
            if let Some(c) = real.min_confidence {
                p = p.with_min_confidence(c);
            }
            Box::new(p)
        }
        None => Box::new(NoRealData),
    };

    let retrainer = DocumentModelRetrainer::for_kind(kind, config, &settings.storage_root, provider)
        .map_err(|e| e.to_string())?;
    Ok(retrainer.retrain())
}

pub fn get_performance_summary(settings: &RetrainSettings, document_type: &str) -> Result<PerformanceSummary, String> {
    open_tracker(settings, document_type)
        .and_then(|t| t.get_performance_summary())
        .map_err(|e| e.to_string())
}

/// Roll back to `version_id`, or to the version before the active one
pub fn rollback(
    settings: &RetrainSettings,
    document_type: &str,
    version_id: Option<&str>,
) -> Result<RollbackResult, String> {
    let run = || -> RetrainResult<RollbackResult> {
        let _lock = lock_document_type(settings, document_type)?;
        let tracker = open_tracker(settings, document_type)?;
        let previous_active = tracker.active_version()?.map(|v| v.version_id);
        let active_version = match version_id {
            Some(id) => {
                tracker.rollback_to(id)?;
                id.to_string()
            }
            None => tracker.rollback_to_previous()?,
        };
        Ok(RollbackResult {
            document_type: document_type.to_string(),
            previous_active,
            active_version,
        })
    };
    run().map_err(|e| e.to_string())
}

/// Prune history to `keep_n` (default: the configured `keep_n_versions`)
pub fn cleanup(settings: &RetrainSettings, document_type: &str, keep_n: Option<usize>) -> Result<CleanupResult, String> {
    let keep_n = keep_n.unwrap_or(settings.for_document_type(document_type).keep_n_versions);
    let run = || -> RetrainResult<CleanupResult> {
        let _lock = lock_document_type(settings, document_type)?;
        let tracker = open_tracker(settings, document_type)?;
        let pruned = tracker.cleanup_old_versions(keep_n)?;
        Ok(CleanupResult {
            document_type: document_type.to_string(),
            keep_n,
            pruned,
            remaining: tracker.history()?.len(),
        })
    };
    run().map_err(|e| e.to_string())
}

/// Load and checksum-verify the active artifact set
pub fn verify_active(settings: &RetrainSettings, document_type: &str) -> Result<VerifyResult, String> {
    let tracker = open_tracker(settings, document_type).map_err(|e| e.to_string())?;
    let active_version = tracker
        .active_version()
        .map_err(|e| e.to_string())?
        .map(|v| v.version_id);

    let (artifacts_ok, error) = match tracker.load_active_bundle() {
        Ok(Some(_)) => (true, None),
        Ok(None) => (false, Some("no active version".to_string())),
        Err(e) => {
            log::error!("Active {} artifacts failed verification: {}", document_type, e);
            (false, Some(e.to_string()))
        }
    };

    Ok(VerifyResult {
        document_type: document_type.to_string(),
        active_version,
        artifacts_ok,
        error,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::RetrainConfig;
    use crate::logic::retrain::OutcomeKind;

    fn settings(root: &Path) -> RetrainSettings {
        RetrainSettings {
            storage_root: root.to_path_buf(),
            defaults: RetrainConfig::quick(),
            document_types: Default::default(),
        }
    }

    #[test]
    fn test_unknown_document_type() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        assert!(retrain(&s, "passport", &RealDataSource::default()).is_err());
    }

    #[test]
    fn test_retrain_verify_rollback_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());

        let first = retrain(&s, "invoice", &RealDataSource::default()).unwrap();
        assert_eq!(first.kind, OutcomeKind::Activated);
        let second = retrain(&s, "invoice", &RealDataSource::default()).unwrap();
        assert_eq!(second.kind, OutcomeKind::Activated);

        let verify = verify_active(&s, "invoice").unwrap();
        assert!(verify.artifacts_ok);
        assert_eq!(verify.active_version, second.version_id);

        let rolled = rollback(&s, "invoice", None).unwrap();
        assert_eq!(Some(rolled.active_version.clone()), first.version_id);
        assert_eq!(rolled.previous_active, second.version_id);

        let cleaned = cleanup(&s, "invoice", Some(1)).unwrap();
        assert_eq!(cleaned.remaining, 1);
        assert_eq!(cleaned.pruned, vec![second.version_id.unwrap()]);

        let summary = get_performance_summary(&s, "invoice").unwrap();
        assert_eq!(summary.active_version, first.version_id);
    }

    #[test]
    fn test_rollback_and_cleanup_wait_for_retrain_lock() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        retrain(&s, "invoice", &RealDataSource::default()).unwrap();
        retrain(&s, "invoice", &RealDataSource::default()).unwrap();
        let before = get_performance_summary(&s, "invoice").unwrap();

        let held = lock_document_type(&s, "invoice").unwrap();
        let err = rollback(&s, "invoice", None).unwrap_err();
        assert!(err.contains("is held by"), "{}", err);
        let err = cleanup(&s, "invoice", Some(1)).unwrap_err();
        assert!(err.contains("is held by"), "{}", err);

        let during = get_performance_summary(&s, "invoice").unwrap();
        assert_eq!(during.total_versions, before.total_versions);
        assert_eq!(during.active_version, before.active_version);

        drop(held);
        assert!(rollback(&s, "invoice", None).is_ok());
    }

    #[test]
    fn test_verify_without_versions() {
        let dir = tempfile::tempdir().unwrap();
        let v = verify_active(&settings(dir.path()), "bank_statement").unwrap();
        assert!(!v.artifacts_ok);
        assert_eq!(v.active_version, None);
    }

    #[test]
    fn test_lists_builtin_layouts() {
        let layouts = list_document_types();
        assert_eq!(layouts.len(), 2);
        assert!(layouts.iter().all(|l| l.feature_count > 0));
    }
}
