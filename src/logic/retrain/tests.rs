use std::path::Path;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::orchestrator::DocumentModelRetrainer;
use super::outcome::OutcomeKind;
use crate::logic::config::{EnsembleWeights, RetrainConfig};
use crate::logic::dataset::DataSource;
use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::{DocumentKind, FeatureSchema, FeatureTable};
use crate::logic::providers::{NoRealData, ProfileSyntheticProvider, RealDataProvider, SyntheticDataProvider};
use crate::logic::training::{ModelMetrics, VersionMetrics};
use crate::logic::versioning::{ModelVersion, RetrainLock, TrainingDataInfo};

// ============================================================================
// TEST PROVIDERS
// ============================================================================

/// Real provider serving a fixed slice of a profile generator's output
struct FixedReal(Option<FeatureTable>);

impl RealDataProvider for FixedReal {
    fn fetch(&self) -> RetrainResult<Option<FeatureTable>> {
        Ok(self.0.clone())
    }
}

struct FailingReal;

impl RealDataProvider for FailingReal {
    fn fetch(&self) -> RetrainResult<Option<FeatureTable>> {
        Err(RetrainError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "store offline",
        )))
    }
}

/// Features carry no signal about the label
struct NoiseSynthetic {
    schema: FeatureSchema,
}

impl SyntheticDataProvider for NoiseSynthetic {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn generate(&self, n: usize) -> FeatureTable {
        let mut rng = StdRng::seed_from_u64(5);
        let features = Array2::from_shape_fn((n, self.schema.len()), |_| rng.gen_range(0.0..1.0));
        let risk = (0..n).map(|i| if i % 2 == 0 { 10.0 } else { 90.0 }).collect();
        FeatureTable::new(self.schema.clone(), features, risk).unwrap()
    }
}

struct EmptySynthetic {
    schema: FeatureSchema,
}

impl SyntheticDataProvider for EmptySynthetic {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn generate(&self, _n: usize) -> FeatureTable {
        FeatureTable::empty(self.schema.clone())
    }
}

fn invoice_rows(n: usize, seed: u64) -> FeatureTable {
    ProfileSyntheticProvider::for_kind(DocumentKind::Invoice, seed).generate(n)
}

fn retrainer(root: &Path, config: RetrainConfig, real: Box<dyn RealDataProvider>) -> DocumentModelRetrainer {
    DocumentModelRetrainer::for_kind(DocumentKind::Invoice, config, root, real).unwrap()
}

fn seed_active_version(root: &Path, config: &RetrainConfig, r2: f64) -> String {
    let r = retrainer(root, config.clone(), Box::new(NoRealData));
    let tracker = r.tracker().unwrap();
    let (version_id, timestamp) = tracker.next_version_stamp().unwrap();
    let m = ModelMetrics { mse: 50.0, r2_score: r2 };
    tracker
        .record_version(ModelVersion {
            version_id: version_id.clone(),
            timestamp,
            data_source: DataSource::Real,
            training_data_info: TrainingDataInfo {
                total: 2000,
                real_count: 2000,
                synthetic_count: 0,
                fraud_count: 600,
                fraud_ratio: 0.3,
            },
            metrics: VersionMetrics {
                r2_score: r2,
                mse: 50.0,
                model_a: m,
                model_b: m,
                ensemble_weights: EnsembleWeights::default(),
                training_time_secs: 1.0,
                train_size: 1600,
                test_size: 400,
            },
            schema_hash: DocumentKind::Invoice.schema().layout_hash(),
            is_active: false,
        })
        .unwrap();
    tracker.activate_version(&version_id).unwrap();
    version_id
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_first_run_on_synthetic_data_activates() {
    let dir = tempfile::tempdir().unwrap();
    let r = retrainer(dir.path(), RetrainConfig::quick(), Box::new(NoRealData));

    let out = r.retrain();
    assert_eq!(out.kind, OutcomeKind::Activated, "{:?}", out.error);
    assert!(out.success && out.activated);
    assert_eq!(out.data_source, Some(DataSource::Synthetic));

    let info = out.training_data_info.as_ref().unwrap();
    assert_eq!(info.total, 1000);
    assert_eq!(info.synthetic_count, 1000);
    assert_eq!(info.real_count, 0);

    let tracker = r.tracker().unwrap();
    let id = out.version_id.unwrap();
    assert_eq!(tracker.store().read_pointer().unwrap(), Some(id.clone()));
    assert!(tracker.store().has_artifacts(&id));
    assert!(tracker.load_active_bundle().unwrap().is_some());
}

#[test]
fn test_regression_keeps_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = RetrainConfig {
        rollback_threshold_drop: 0.15,
        ..RetrainConfig::quick()
    };
    let prior = seed_active_version(dir.path(), &config, 0.85);

    let schema = DocumentKind::Invoice.schema();
    let r = DocumentModelRetrainer::new(
        schema.clone(),
        config,
        dir.path(),
        Box::new(NoRealData),
        Box::new(NoiseSynthetic { schema }),
    )
    .unwrap();

    let out = r.retrain();
    assert_eq!(out.kind, OutcomeKind::RegressionRejected, "{:?}", out.error);
    assert!(out.success);
    assert!(!out.activated);
    assert!(out.reason.is_some());
    assert!(out.metrics.as_ref().unwrap().r2_score < 0.70);

    let tracker = r.tracker().unwrap();
    assert_eq!(tracker.store().read_pointer().unwrap(), Some(prior.clone()));

    let history = tracker.history().unwrap();
    assert_eq!(history.len(), 2);
    let rejected = history.last().unwrap();
    assert_eq!(Some(&rejected.version_id), out.version_id.as_ref());
    assert!(!rejected.is_active);
    assert!(!tracker.store().has_artifacts(&rejected.version_id));
}

#[test]
fn test_little_real_data_falls_back_to_synthetic() {
    let dir = tempfile::tempdir().unwrap();
    let real = FixedReal(Some(invoice_rows(50, 77)));
    let r = retrainer(dir.path(), RetrainConfig::quick(), Box::new(real));

    let out = r.retrain();
    assert!(out.success);
    assert_eq!(out.data_source, Some(DataSource::Synthetic));
    assert_eq!(out.training_data_info.unwrap().real_count, 0);
}

#[test]
fn test_hybrid_blend_counts() {
    let dir = tempfile::tempdir().unwrap();
    let real = FixedReal(Some(invoice_rows(300, 77)));
    let r = retrainer(dir.path(), RetrainConfig::quick(), Box::new(real));

    let out = r.retrain();
    assert!(out.success, "{:?}", out.error);
    assert_eq!(out.data_source, Some(DataSource::Hybrid));
    let info = out.training_data_info.unwrap();
    assert_eq!(info.real_count, 300);
    assert_eq!(info.synthetic_count, 129);
    assert_eq!(info.total, 429);
}

#[test]
fn test_enough_real_data_trains_on_real_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = RetrainConfig {
        min_hybrid: 50,
        min_real_only: 200,
        ..RetrainConfig::quick()
    };
    let real = FixedReal(Some(invoice_rows(250, 77)));
    let out = retrainer(dir.path(), config, Box::new(real)).retrain();
    assert_eq!(out.data_source, Some(DataSource::Real));
    assert_eq!(out.training_data_info.unwrap().synthetic_count, 0);
}

// ============================================================================
// FAILURE PATHS
// ============================================================================

#[test]
fn test_quality_failure_trains_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = RetrainConfig {
        synthetic_sample_count: 40,
        ..RetrainConfig::quick()
    };
    let r = retrainer(dir.path(), config, Box::new(NoRealData));

    let out = r.retrain();
    assert_eq!(out.kind, OutcomeKind::QualityRejected);
    assert!(!out.success && !out.activated);
    assert!(out.reason.unwrap().contains("insufficient samples"));
    assert!(out.metrics.is_none());
    assert!(r.tracker().unwrap().history().unwrap().is_empty());
}

#[test]
fn test_held_lock_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let r = retrainer(dir.path(), RetrainConfig::quick(), Box::new(NoRealData));

    let lock_path = dir.path().join("invoice").join(crate::constants::LOCK_FILE_NAME);
    std::fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
    let _held = RetrainLock::acquire(&lock_path, "invoice", std::time::Duration::from_secs(3600)).unwrap();

    let out = r.retrain();
    assert_eq!(out.kind, OutcomeKind::Unavailable);
    assert!(!out.success);
    assert!(!dir.path().join("invoice").join(crate::constants::HISTORY_FILE_NAME).exists());
}

#[test]
fn test_no_data_at_all_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let schema = DocumentKind::Invoice.schema();
    let r = DocumentModelRetrainer::new(
        schema.clone(),
        RetrainConfig::quick(),
        dir.path(),
        Box::new(NoRealData),
        Box::new(EmptySynthetic { schema }),
    )
    .unwrap();

    let out = r.retrain();
    assert_eq!(out.kind, OutcomeKind::Unavailable);
    assert!(out.version_id.is_none());
}

#[test]
fn test_real_fetch_error_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    let out = retrainer(dir.path(), RetrainConfig::quick(), Box::new(FailingReal)).retrain();
    assert_eq!(out.kind, OutcomeKind::Activated);
    assert!(out.warnings.iter().any(|w| w.contains("store offline")));
}

#[test]
fn test_schema_mismatch_rejected_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let result = DocumentModelRetrainer::new(
        DocumentKind::Invoice.schema(),
        RetrainConfig::quick(),
        dir.path(),
        Box::new(NoRealData),
        Box::new(ProfileSyntheticProvider::for_kind(DocumentKind::BankStatement, 1)),
    );
    assert!(matches!(result, Err(RetrainError::SchemaMismatch { .. })));
}

#[test]
fn test_real_rows_with_wrong_schema_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let foreign = ProfileSyntheticProvider::for_kind(DocumentKind::BankStatement, 1).generate(300);
    let out = retrainer(dir.path(), RetrainConfig::quick(), Box::new(FixedReal(Some(foreign)))).retrain();
    assert_eq!(out.kind, OutcomeKind::QualityRejected);
    assert!(out.error.unwrap().contains("Schema mismatch"));
}

// ============================================================================
// REPEATED RUNS
// ============================================================================

#[test]
fn test_same_input_same_metrics_across_stores() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let ma = retrainer(a.path(), RetrainConfig::quick(), Box::new(NoRealData)).retrain().metrics.unwrap();
    let mb = retrainer(b.path(), RetrainConfig::quick(), Box::new(NoRealData)).retrain().metrics.unwrap();
    assert_eq!(ma.r2_score, mb.r2_score);
    assert_eq!(ma.mse, mb.mse);
}

#[test]
fn test_repeated_runs_prune_to_keep_n() {
    let dir = tempfile::tempdir().unwrap();
    let config = RetrainConfig {
        keep_n_versions: 2,
        ..RetrainConfig::quick()
    };
    let r = retrainer(dir.path(), config, Box::new(NoRealData));

    let ids: Vec<String> = (0..3)
        .map(|_| {
            let out = r.retrain();
            assert_eq!(out.kind, OutcomeKind::Activated);
            out.version_id.unwrap()
        })
        .collect();

    let tracker = r.tracker().unwrap();
    let summary = tracker.get_performance_summary().unwrap();
    assert_eq!(summary.total_versions, 2);
    assert_eq!(summary.active_version.as_deref(), Some(ids[2].as_str()));
    assert!(!tracker.store().has_artifacts(&ids[0]));
}
