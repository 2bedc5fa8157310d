//! Retraining Configuration
//!
//! Per-document-type knobs for blending, validation, training and retention.
//! Can be loaded from a JSON settings file or built at runtime.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logic::error::{RetrainError, RetrainResult};
use crate::logic::features::validate_document_type;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_MIN_SAMPLES_FOR_TRAINING: usize = 100;
pub const DEFAULT_MIN_SAMPLES_PER_CLASS: usize = 20;
pub const DEFAULT_MIN_HYBRID: usize = 100;
pub const DEFAULT_MIN_REAL_ONLY: usize = 1000;
pub const DEFAULT_SYNTHETIC_WEIGHT: f64 = 0.3;
pub const DEFAULT_REAL_WEIGHT: f64 = 0.7;
pub const DEFAULT_SYNTHETIC_SAMPLE_COUNT: usize = 1000;
pub const DEFAULT_ROLLBACK_THRESHOLD_DROP: f64 = 0.05;
pub const DEFAULT_KEEP_N_VERSIONS: usize = 5;
pub const DEFAULT_RANDOM_SEED: u64 = 42;

// ============================================================================
// MODEL PARAMETERS
// ============================================================================

/// Bagged regression trees (model A)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of features considered at each split (0, 1]
    pub max_features: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 60,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: 0.6,
        }
    }
}

/// Gradient-boosted regression trees (model B)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row fraction sampled for each stage (0, 1]
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 120,
            learning_rate: 0.1,
            max_depth: 4,
            min_samples_leaf: 3,
            subsample: 0.8,
        }
    }
}

/// Weights of the fixed ensemble average
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub model_a: f64,
    pub model_b: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            model_a: 0.4,
            model_b: 0.6,
        }
    }
}

impl EnsembleWeights {
    /// Weights scaled to sum to 1
    pub fn normalized(&self) -> (f64, f64) {
        let sum = self.model_a + self.model_b;
        (self.model_a / sum, self.model_b / sum)
    }
}

// ============================================================================
// RETRAIN CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    /// Minimum rows in the blended table
    pub min_samples_for_training: usize,
    /// Minimum rows in each of the legitimate and fraud classes
    pub min_samples_per_class: usize,
    /// Real rows needed before real data is blended in at all
    pub min_hybrid: usize,
    /// Real rows needed to train on real data alone
    pub min_real_only: usize,
    pub synthetic_weight_hybrid: f64,
    pub real_weight_hybrid: f64,
    /// Rows requested from the synthetic provider
    pub synthetic_sample_count: usize,
    pub ensemble_weights: EnsembleWeights,
    /// Maximum tolerated R² drop versus the active version
    pub rollback_threshold_drop: f64,
    pub keep_n_versions: usize,
    /// Held-out fraction for metrics
    pub test_fraction: f64,
    pub random_seed: u64,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    /// A lock file older than this is considered abandoned
    pub lock_stale_after_secs: u64,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            min_samples_for_training: DEFAULT_MIN_SAMPLES_FOR_TRAINING,
            min_samples_per_class: DEFAULT_MIN_SAMPLES_PER_CLASS,
            min_hybrid: DEFAULT_MIN_HYBRID,
            min_real_only: DEFAULT_MIN_REAL_ONLY,
            synthetic_weight_hybrid: DEFAULT_SYNTHETIC_WEIGHT,
            real_weight_hybrid: DEFAULT_REAL_WEIGHT,
            synthetic_sample_count: DEFAULT_SYNTHETIC_SAMPLE_COUNT,
            ensemble_weights: EnsembleWeights::default(),
            rollback_threshold_drop: DEFAULT_ROLLBACK_THRESHOLD_DROP,
            keep_n_versions: DEFAULT_KEEP_N_VERSIONS,
            test_fraction: 0.2,
            random_seed: DEFAULT_RANDOM_SEED,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            lock_stale_after_secs: 3600,
        }
    }
}

impl RetrainConfig {
    /// Small, fast models for tests and smoke runs
    pub fn quick() -> Self {
        Self {
            forest: ForestParams {
                n_estimators: 15,
                max_depth: 6,
                ..Default::default()
            },
            boosting: BoostingParams {
                n_estimators: 30,
                max_depth: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Refuse any R² drop at all
    pub fn strict() -> Self {
        Self {
            rollback_threshold_drop: 0.0,
            ..Default::default()
        }
    }

    /// Synthetic rows blended per real row in the hybrid tier
    pub fn hybrid_ratio(&self) -> f64 {
        self.synthetic_weight_hybrid / self.real_weight_hybrid
    }

    pub fn validate(&self) -> RetrainResult<()> {
        let fail = |msg: &str| Err(RetrainError::Config(msg.to_string()));

        if self.min_real_only <= self.min_hybrid {
            return fail("min_real_only must be greater than min_hybrid");
        }
        if !(self.real_weight_hybrid > 0.0) || !(self.synthetic_weight_hybrid >= 0.0) {
            return fail("hybrid weights must be non-negative and real_weight_hybrid > 0");
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return fail("test_fraction must be in (0, 1)");
        }
        let w = self.ensemble_weights;
        if w.model_a < 0.0 || w.model_b < 0.0 || !(w.model_a + w.model_b > 0.0) {
            return fail("ensemble weights must be non-negative with a positive sum");
        }
        if !(self.rollback_threshold_drop >= 0.0) {
            return fail("rollback_threshold_drop must be >= 0");
        }
        if self.keep_n_versions == 0 {
            return fail("keep_n_versions must be at least 1");
        }
        if self.forest.n_estimators == 0 || self.boosting.n_estimators == 0 {
            return fail("each model needs at least one estimator");
        }
        if !(self.forest.max_features > 0.0 && self.forest.max_features <= 1.0) {
            return fail("forest.max_features must be in (0, 1]");
        }
        if !(self.boosting.subsample > 0.0 && self.boosting.subsample <= 1.0) {
            return fail("boosting.subsample must be in (0, 1]");
        }
        if !(self.boosting.learning_rate > 0.0) {
            return fail("boosting.learning_rate must be > 0");
        }
        Ok(())
    }
}

// ============================================================================
// SETTINGS FILE
// ============================================================================

/// Settings file: storage root, defaults, and per-document-type configs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainSettings {
    pub storage_root: PathBuf,
    pub defaults: RetrainConfig,
    /// Full per-type configs; omitted fields take the built-in defaults
    pub document_types: HashMap<String, RetrainConfig>,
}

impl Default for RetrainSettings {
    fn default() -> Self {
        Self {
            storage_root: crate::constants::get_storage_root(),
            defaults: RetrainConfig::default(),
            document_types: HashMap::new(),
        }
    }
}

impl RetrainSettings {
    pub fn load(path: &Path) -> RetrainResult<Self> {
        let data = fs::read(path)?;
        let settings: RetrainSettings = serde_json::from_slice(&data)?;
        settings.validate()?;
        log::info!(
            "Loaded retrain settings from {} ({} document type overrides)",
            path.display(),
            settings.document_types.len()
        );
        Ok(settings)
    }

    /// Settings file if configured, built-in defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> RetrainResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn for_document_type(&self, document_type: &str) -> &RetrainConfig {
        self.document_types.get(document_type).unwrap_or(&self.defaults)
    }

    pub fn validate(&self) -> RetrainResult<()> {
        self.defaults.validate()?;
        for (key, cfg) in &self.document_types {
            validate_document_type(key)?;
            cfg.validate()
                .map_err(|e| RetrainError::Config(format!("{}: {}", key, e)))?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
