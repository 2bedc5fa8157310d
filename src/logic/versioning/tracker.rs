//! Performance Tracker - promotion, activation, retention, rollback
//!
//! Version lifecycle: CANDIDATE (recorded) → ACTIVE | REJECTED, ACTIVE → PRUNED.
//! The history file is authoritative; the pointer is written after it.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use super::audit::{AuditAction, AuditLog, AuditLogEntry};
use super::store::VersionStore;
use super::types::{ActivationDecision, ArtifactRole, ModelVersion, PerformanceSummary, VersionSummary};
use crate::logic::config::RetrainConfig;
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::training::{EnsembleModel, GradientBoosting, RandomForest, StandardScaler};

/// `chrono` format of version ids; lexical order is time order
pub const VERSION_ID_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Slack for float error in R² deltas, so a drop of exactly the threshold passes
const R2_TOLERANCE: f64 = 1e-9;

/// A loaded, checksum-verified artifact set
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub version: ModelVersion,
    pub model: EnsembleModel,
}

pub struct PerformanceTracker {
    store: VersionStore,
    audit: AuditLog,
    rollback_threshold_drop: f64,
    run_id: Option<String>,
}

impl PerformanceTracker {
    pub fn new(store: VersionStore, config: &RetrainConfig) -> Self {
        let audit = AuditLog::new(store.audit_path());
        Self {
            store,
            audit,
            rollback_threshold_drop: config.rollback_threshold_drop,
            run_id: None,
        }
    }

    pub fn open(storage_root: &Path, document_type: &str, config: &RetrainConfig) -> RetrainResult<Self> {
        Ok(Self::new(VersionStore::open(storage_root, document_type)?, config))
    }

    /// Tag audit entries with a retrain run
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn entry(&self, action: AuditAction) -> AuditLogEntry {
        AuditLogEntry::new(action, self.store.document_type()).with_run(self.run_id.as_deref())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn history(&self) -> RetrainResult<Vec<ModelVersion>> {
        self.store.load_history()
    }

    pub fn active_version(&self) -> RetrainResult<Option<ModelVersion>> {
        Ok(self.history()?.into_iter().find(|v| v.is_active))
    }

    /// Id and timestamp for a new version, strictly after every recorded one
    pub fn next_version_stamp(&self) -> RetrainResult<(String, DateTime<Utc>)> {
        let mut ts = Utc::now().trunc_subsecs(6);
        if let Some(last) = self.history()?.iter().map(|v| v.timestamp).max() {
            if ts <= last {
                ts = last + Duration::microseconds(1);
            }
        }
        Ok((ts.format(VERSION_ID_FORMAT).to_string(), ts))
    }

    pub fn get_performance_summary(&self) -> RetrainResult<PerformanceSummary> {
        let mut history = self.history()?;
        history.sort_by(|a, b| a.version_id.cmp(&b.version_id));
        Ok(PerformanceSummary {
            document_type: self.store.document_type().to_string(),
            total_versions: history.len(),
            active_version: history.iter().find(|v| v.is_active).map(|v| v.version_id.clone()),
            versions: history.iter().map(VersionSummary::from).collect(),
        })
    }

    // ========================================================================
    // RECORD & COMPARE
    // ========================================================================

    /// Append a candidate; it is never active on arrival
    pub fn record_version(&self, mut version: ModelVersion) -> RetrainResult<()> {
        let mut history = self.history()?;
        if history.iter().any(|v| v.version_id == version.version_id) {
            return Err(RetrainError::persistence(
                self.store.history_path(),
                format!("version {} already recorded", version.version_id),
            ));
        }
        version.is_active = false;
        let details = format!("r2={:.4} source={}", version.metrics.r2_score, version.data_source);
        let id = version.version_id.clone();
        history.push(version);
        self.store.save_history(&history)?;

        self.audit.log(self.entry(AuditAction::VersionRecorded).with_version(&id).with_details(details));
        log::info!("Recorded {} version {}", self.store.document_type(), id);
        Ok(())
    }

    /// Accept unless R² dropped by more than the threshold (strict)
    pub fn compare_with_previous(&self, new_r2: f64) -> RetrainResult<ActivationDecision> {
        let previous = match self.active_version()? {
            Some(v) => v,
            None => {
                return Ok(ActivationDecision {
                    should_activate: true,
                    reason: "no previous active version".to_string(),
                    previous_version: None,
                    previous_r2: None,
                    delta: None,
                })
            }
        };

        let previous_r2 = previous.metrics.r2_score;
        let delta = new_r2 - previous_r2;
        let should_activate = !(delta < -(self.rollback_threshold_drop + R2_TOLERANCE));
        let reason = if should_activate {
            format!(
                "R² {:.4} vs {:.4} (delta {:+.4}) within tolerance {:.4}",
                new_r2, previous_r2, delta, self.rollback_threshold_drop
            )
        } else {
            format!(
                "R² dropped from {:.4} to {:.4} (delta {:+.4}, tolerance {:.4})",
                previous_r2, new_r2, delta, self.rollback_threshold_drop
            )
        };

        Ok(ActivationDecision {
            should_activate,
            reason,
            previous_version: Some(previous.version_id),
            previous_r2: Some(previous_r2),
            delta: Some(delta),
        })
    }

    // ========================================================================
    // ARTIFACTS
    // ========================================================================

    /// Write the three artifacts of a version; partial files are removed on failure
    pub fn persist_artifacts(&self, version: &ModelVersion, model: &EnsembleModel) -> RetrainResult<()> {
        let id = &version.version_id;
        let hash = version.schema_hash;

        let result = self
            .store
            .write_artifact(ArtifactRole::Scaler, id, hash, &model.scaler)
            .and_then(|_| self.store.write_artifact(ArtifactRole::ModelA, id, hash, &model.model_a))
            .and_then(|_| self.store.write_artifact(ArtifactRole::ModelB, id, hash, &model.model_b));

        if let Err(e) = result {
            if let Err(cleanup) = self.store.delete_artifacts(id) {
                log::warn!("Failed to remove partial artifacts of {}: {}", id, cleanup);
            }
            return Err(e);
        }

        self.audit.log(self.entry(AuditAction::ArtifactsPersisted).with_version(id));
        Ok(())
    }

    pub fn load_bundle(&self, version_id: &str) -> RetrainResult<ModelBundle> {
        let version = self
            .history()?
            .into_iter()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| RetrainError::VersionNotFound(version_id.to_string()))?;

        let hash = version.schema_hash;
        let scaler: StandardScaler = self.store.read_artifact(ArtifactRole::Scaler, version_id, hash)?;
        let model_a: RandomForest = self.store.read_artifact(ArtifactRole::ModelA, version_id, hash)?;
        let model_b: GradientBoosting = self.store.read_artifact(ArtifactRole::ModelB, version_id, hash)?;

        let model = EnsembleModel {
            scaler,
            model_a,
            model_b,
            weights: version.metrics.ensemble_weights,
        };
        Ok(ModelBundle { version, model })
    }

    /// Verified artifact set of the active version, if any
    pub fn load_active_bundle(&self) -> RetrainResult<Option<ModelBundle>> {
        match self.active_version()? {
            Some(v) => self.load_bundle(&v.version_id).map(Some),
            None => Ok(None),
        }
    }

    // ========================================================================
    // ACTIVATION
    // ========================================================================

    /// Make `version_id` the only active version. Idempotent.
    ///
    /// History is rewritten first, then the pointer. If the pointer write
    /// fails the previous history is restored.
    pub fn activate_version(&self, version_id: &str) -> RetrainResult<()> {
        let previous = self.history()?;
        if !previous.iter().any(|v| v.version_id == version_id) {
            return Err(RetrainError::VersionNotFound(version_id.to_string()));
        }

        let mut updated = previous.clone();
        for v in updated.iter_mut() {
            v.is_active = v.version_id == version_id;
        }
        let history_changed = updated != previous;
        let pointer_current = self.store.read_pointer().ok().flatten().as_deref() == Some(version_id);

        if !history_changed && pointer_current {
            log::debug!("Version {} already active", version_id);
            return Ok(());
        }

        if history_changed {
            self.store.save_history(&updated)?;
        }
        if let Err(e) = self.store.write_pointer(version_id) {
            log::error!("Activation of {} failed: {}", version_id, e);
            if history_changed {
                if let Err(restore) = self.store.save_history(&previous) {
                    log::error!("Failed to restore history after pointer failure: {}", restore);
                    return Err(RetrainError::ActivationIncomplete {
                        version_id: version_id.to_string(),
                        reason: format!("{}; restore: {}", e, restore),
                    });
                }
            }
            return Err(e);
        }

        self.audit.log(self.entry(AuditAction::VersionActivated).with_version(version_id));
        log::info!("Activated {} version {}", self.store.document_type(), version_id);
        Ok(())
    }

    /// Delete the artifacts of a version that failed promotion, unless the
    /// history still marks it active. Returns whether anything was discarded.
    pub fn discard_unpromoted(&self, version_id: &str) -> RetrainResult<bool> {
        if self.history()?.iter().any(|v| v.version_id == version_id && v.is_active) {
            log::warn!("Keeping artifacts of {}: history still marks it active", version_id);
            return Ok(false);
        }
        self.store.delete_artifacts(version_id)?;
        Ok(true)
    }

    // ========================================================================
    // RETENTION
    // ========================================================================

    /// Keep the newest `keep_n` versions; the active version always survives.
    /// Returns the pruned version ids.
    pub fn cleanup_old_versions(&self, keep_n: usize) -> RetrainResult<Vec<String>> {
        let keep_n = keep_n.max(1);
        let mut history = self.history()?;
        if history.len() <= keep_n {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = history.iter().map(|v| v.version_id.clone()).collect();
        ids.sort();
        let window_start = ids.len() - keep_n;
        let mut keep: HashSet<&str> = ids[window_start..].iter().map(|s| s.as_str()).collect();

        if let Some(active) = history.iter().find(|v| v.is_active) {
            if !keep.contains(active.version_id.as_str()) {
                keep.remove(ids[window_start].as_str());
                keep.insert(active.version_id.as_str());
            }
        }
        let keep: HashSet<String> = keep.into_iter().map(|s| s.to_string()).collect();

        let pruned: Vec<String> = ids.iter().filter(|id| !keep.contains(*id)).cloned().collect();
        history.retain(|v| keep.contains(&v.version_id));
        self.store.save_history(&history)?;

        let mut first_error = None;
        for id in &pruned {
            if let Err(e) = self.store.delete_artifacts(id) {
                log::warn!("Failed to delete artifacts of pruned version {}: {}", id, e);
                first_error.get_or_insert(e);
            }
        }

        self.audit.log(
            self.entry(AuditAction::VersionsPruned)
                .with_details(format!("kept {}, pruned {}", history.len(), pruned.join(","))),
        );
        log::info!(
            "Pruned {} old {} versions (keeping {})",
            pruned.len(),
            self.store.document_type(),
            history.len()
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(pruned),
        }
    }

    // ========================================================================
    // ROLLBACK
    // ========================================================================

    /// Re-activate an earlier version whose artifacts load and verify
    pub fn rollback_to(&self, version_id: &str) -> RetrainResult<()> {
        let from = self.active_version()?.map(|v| v.version_id);
        self.load_bundle(version_id)?;
        self.activate_version(version_id)?;

        self.audit.log(
            self.entry(AuditAction::RolledBack)
                .with_version(version_id)
                .with_details(format!("from {}", from.as_deref().unwrap_or("none"))),
        );
        log::warn!(
            "Rolled back {} from {:?} to {}",
            self.store.document_type(),
            from,
            version_id
        );
        Ok(())
    }

    /// Roll back to the newest version older than the active one that still
    /// has verifiable artifacts. Returns its id.
    pub fn rollback_to_previous(&self) -> RetrainResult<String> {
        let mut history = self.history()?;
        history.sort_by(|a, b| b.version_id.cmp(&a.version_id));
        let active = history.iter().find(|v| v.is_active).map(|v| v.version_id.clone());

        for v in &history {
            if v.is_active || active.as_ref().map_or(false, |a| v.version_id >= *a) {
                continue;
            }
            if !self.store.has_artifacts(&v.version_id) {
                continue;
            }
            match self.load_bundle(&v.version_id) {
                Ok(_) => {
                    self.rollback_to(&v.version_id)?;
                    return Ok(v.version_id.clone());
                }
                Err(e) => log::warn!("Skipping {} for rollback: {}", v.version_id, e),
            }
        }

        Err(RetrainError::VersionNotFound(format!(
            "no version older than {} with usable artifacts",
            active.as_deref().unwrap_or("none")
        )))
    }
}
