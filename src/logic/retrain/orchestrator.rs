//! Document Model Retrainer - full pipeline for one document type
//!
//! Flow:
//! 1. Take the document type's advisory lock
//! 2. Fetch real rows (absence and fetch errors are tolerated)
//! 3. Generate synthetic rows, blend, run the quality gate
//! 4. Train, then record the version unconditionally
//! 5. Compare with the active version; on accept persist, activate, prune

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::outcome::{OutcomeKind, RetrainOutcome};
use crate::logic::config::RetrainConfig;
use crate::logic::dataset::{BlendPolicy, DataBlender, DataQualityValidator, QualityThresholds};
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::{validate_document_type, DocumentKind, FeatureSchema};
use crate::logic::providers::{ProfileSyntheticProvider, RealDataProvider, SyntheticDataProvider};
use crate::logic::training::EnsembleTrainer;
use crate::logic::versioning::{
    AuditAction, AuditLogEntry, ModelVersion, PerformanceTracker, RetrainLock, TrainingDataInfo, VersionStore,
};

pub struct DocumentModelRetrainer {
    schema: FeatureSchema,
    config: RetrainConfig,
    storage_root: PathBuf,
    real: Box<dyn RealDataProvider>,
    synthetic: Box<dyn SyntheticDataProvider>,
}

impl DocumentModelRetrainer {
    pub fn new(
        schema: FeatureSchema,
        config: RetrainConfig,
        storage_root: impl Into<PathBuf>,
        real: Box<dyn RealDataProvider>,
        synthetic: Box<dyn SyntheticDataProvider>,
    ) -> RetrainResult<Self> {
        validate_document_type(&schema.document_type)?;
        config.validate()?;
        schema.ensure_matches(synthetic.schema())?;
        Ok(Self {
            schema,
            config,
            storage_root: storage_root.into(),
            real,
            synthetic,
        })
    }

    /// Retrainer for a built-in document kind with its profile generator
    pub fn for_kind(
        kind: DocumentKind,
        config: RetrainConfig,
        storage_root: impl Into<PathBuf>,
        real: Box<dyn RealDataProvider>,
    ) -> RetrainResult<Self> {
        let synthetic = ProfileSyntheticProvider::for_kind(kind, config.random_seed);
        Self::new(kind.schema(), config, storage_root, real, Box::new(synthetic))
    }

    pub fn document_type(&self) -> &str {
        &self.schema.document_type
    }

    pub fn config(&self) -> &RetrainConfig {
        &self.config
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn tracker(&self) -> RetrainResult<PerformanceTracker> {
        PerformanceTracker::open(&self.storage_root, self.document_type(), &self.config)
    }

    fn acquire_lock(&self) -> RetrainResult<RetrainLock> {
        VersionStore::lock(
            &self.storage_root,
            self.document_type(),
            Duration::from_secs(self.config.lock_stale_after_secs),
        )
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    /// Run one retrain cycle. Never panics or returns an error: every way the
    /// run can end is an `OutcomeKind` on the result.
    pub fn retrain(&self) -> RetrainOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut out = RetrainOutcome::start(&run_id, self.document_type());
        log::info!("[{}] Retraining {} model", run_id, self.document_type());

        let _lock = match self.acquire_lock() {
            Ok(lock) => lock,
            Err(e) => {
                let kind = match &e {
                    RetrainError::LockHeld { .. } => OutcomeKind::Unavailable,
                    _ => OutcomeKind::PersistenceFailed,
                };
                log::warn!("[{}] Not retraining {}: {}", run_id, self.document_type(), e);
                out.reason = Some("retrain lock unavailable".to_string());
                out.error = Some(e.to_string());
                return out.finish(kind);
            }
        };

        let tracker = match self.tracker() {
            Ok(t) => t.with_run_id(&run_id),
            Err(e) => {
                log::error!("[{}] Cannot open version store: {}", run_id, e);
                out.reason = Some("version store unavailable".to_string());
                out.error = Some(e.to_string());
                return out.finish(OutcomeKind::PersistenceFailed);
            }
        };
        tracker.audit().log(self.audit_entry(AuditAction::RetrainStarted, &run_id));

        let kind = self.run(&tracker, &mut out);
        let out = out.finish(kind);

        log::info!(
            "[{}] Retrain of {} finished: {} (version {:?})",
            run_id,
            self.document_type(),
            out.kind,
            out.version_id
        );
        out
    }

    fn run(&self, tracker: &PerformanceTracker, out: &mut RetrainOutcome) -> OutcomeKind {
        let run_id = out.run_id.clone();

        // ---- Data --------------------------------------------------------
        let real = match self.real.fetch() {
            Ok(r) => r,
            Err(e) => {
                out.warn(format!("real data fetch failed, continuing without it: {}", e));
                None
            }
        };
        let synthetic = self.synthetic.generate(self.config.synthetic_sample_count);

        if real.as_ref().map_or(true, |r| r.is_empty()) && synthetic.is_empty() {
            out.reason = Some("no real or synthetic training data available".to_string());
            tracker.audit().log(
                self.audit_entry(AuditAction::RetrainSkipped, &run_id).with_details("no data"),
            );
            return OutcomeKind::Unavailable;
        }

        let blender = DataBlender::new(self.schema.clone(), BlendPolicy::from_config(&self.config));
        let blend = match blender.blend(real.as_ref(), &synthetic) {
            Ok(b) => b,
            Err(e) => {
                log::error!("[{}] Blending failed: {}", run_id, e);
                out.reason = Some("training data does not match the feature schema".to_string());
                out.error = Some(e.to_string());
                tracker.audit().log(
                    self.audit_entry(AuditAction::QualityRejected, &run_id).with_details(e.to_string()),
                );
                return OutcomeKind::QualityRejected;
            }
        };
        out.data_source = Some(blend.source);

        // ---- Quality gate ------------------------------------------------
        let report = DataQualityValidator::new(QualityThresholds::from_config(&self.config)).validate(&blend.table);
        out.warnings.extend(report.warnings.iter().cloned());
        let info = TrainingDataInfo::from_blend(&blend, &report.counts);
        out.training_data_info = Some(info.clone());

        if !report.ok {
            let reason = report.reason.unwrap_or_else(|| "data quality check failed".to_string());
            tracker.audit().log(
                self.audit_entry(AuditAction::QualityRejected, &run_id).with_details(reason.clone()),
            );
            out.reason = Some(reason);
            return OutcomeKind::QualityRejected;
        }

        // ---- Training ----------------------------------------------------
        let trained = match EnsembleTrainer::from_config(&self.config).train(&blend.table) {
            Ok(t) => t,
            Err(e) => {
                log::error!("[{}] Training failed: {}", run_id, e);
                tracker.audit().log(
                    self.audit_entry(AuditAction::TrainingFailed, &run_id).with_details(e.to_string()),
                );
                out.reason = Some("training failed".to_string());
                out.error = Some(e.to_string());
                return OutcomeKind::TrainingFailed;
            }
        };
        out.metrics = Some(trained.metrics.clone());

        // ---- Record ------------------------------------------------------
        let version = match tracker.next_version_stamp() {
            Ok((version_id, timestamp)) => ModelVersion {
                version_id,
                timestamp,
                data_source: blend.source,
                training_data_info: info,
                metrics: trained.metrics.clone(),
                schema_hash: self.schema.layout_hash(),
                is_active: false,
            },
            Err(e) => return self.persistence_failed(tracker, out, "reading version history", e),
        };
        if let Err(e) = tracker.record_version(version.clone()) {
            return self.persistence_failed(tracker, out, "recording version", e);
        }
        out.version_id = Some(version.version_id.clone());

        // ---- Compare -----------------------------------------------------
        let decision = match tracker.compare_with_previous(version.metrics.r2_score) {
            Ok(d) => d,
            Err(e) => return self.persistence_failed(tracker, out, "reading active version", e),
        };
        out.decision = Some(decision.clone());

        if !decision.should_activate {
            log::warn!("[{}] Keeping previous model: {}", run_id, decision.reason);
            tracker.audit().log(
                self.audit_entry(AuditAction::RegressionRejected, &run_id)
                    .with_version(&version.version_id)
                    .with_details(decision.reason.clone()),
            );
            out.reason = Some(decision.reason);
            return OutcomeKind::RegressionRejected;
        }

        // ---- Promote -----------------------------------------------------
        if let Err(e) = tracker.persist_artifacts(&version, &trained.model) {
            return self.persistence_failed(tracker, out, "writing artifacts", e);
        }
        if let Err(e) = tracker.activate_version(&version.version_id) {
            if let Err(cleanup) = tracker.discard_unpromoted(&version.version_id) {
                log::warn!("[{}] Failed to remove artifacts of unpromoted version: {}", run_id, cleanup);
            }
            return self.persistence_failed(tracker, out, "activating version", e);
        }

        match tracker.cleanup_old_versions(self.config.keep_n_versions) {
            Ok(pruned) if !pruned.is_empty() => {
                log::info!("[{}] Pruned versions: {}", run_id, pruned.join(", "));
            }
            Ok(_) => {}
            Err(e) => out.warn(format!("pruning old versions failed: {}", e)),
        }

        out.reason = Some(decision.reason);
        OutcomeKind::Activated
    }

    fn persistence_failed(
        &self,
        tracker: &PerformanceTracker,
        out: &mut RetrainOutcome,
        step: &str,
        err: RetrainError,
    ) -> OutcomeKind {
        log::error!("[{}] Persistence failed while {}: {}", out.run_id, step, err);
        let mut entry = self
            .audit_entry(AuditAction::PersistenceFailed, &out.run_id)
            .with_details(format!("{}: {}", step, err));
        if let Some(id) = &out.version_id {
            entry = entry.with_version(id);
        }
        tracker.audit().log(entry);
        out.reason = Some(format!("persistence failed while {}", step));
        out.error = Some(err.to_string());
        OutcomeKind::PersistenceFailed
    }

    fn audit_entry(&self, action: AuditAction, run_id: &str) -> AuditLogEntry {
        AuditLogEntry::new(action, self.document_type()).with_run(Some(run_id))
    }
}
