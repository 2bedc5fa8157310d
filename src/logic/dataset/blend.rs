//! Data Blender - Volume-tiered synthetic/real mixing
//!
//! Tier by real row count:
//! - `< min_hybrid`              → synthetic only
//! - `[min_hybrid, min_real_only)` → all real rows + sampled synthetic rows
//! - `>= min_real_only`          → real only
//!
//! In the hybrid tier the synthetic sample is sized to hold the configured
//! synthetic:real weight ratio. A pool smaller than that is used whole.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::config::RetrainConfig;
use crate::logic::error::RetrainResult;
use crate::logic::features::{FeatureSchema, FeatureTable};

/// Provenance of the training set a version was fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Synthetic,
    Hybrid,
    Real,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Synthetic => "synthetic",
            DataSource::Hybrid => "hybrid",
            DataSource::Real => "real",
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPolicy {
    pub min_hybrid: usize,
    pub min_real_only: usize,
    pub synthetic_weight: f64,
    pub real_weight: f64,
    pub seed: u64,
}

impl BlendPolicy {
    pub fn from_config(config: &RetrainConfig) -> Self {
        Self {
            min_hybrid: config.min_hybrid,
            min_real_only: config.min_real_only,
            synthetic_weight: config.synthetic_weight_hybrid,
            real_weight: config.real_weight_hybrid,
            seed: config.random_seed,
        }
    }

    pub fn tier(&self, real_count: usize) -> DataSource {
        if real_count < self.min_hybrid {
            DataSource::Synthetic
        } else if real_count < self.min_real_only {
            DataSource::Hybrid
        } else {
            DataSource::Real
        }
    }

    /// Synthetic rows to add in the hybrid tier, capped at the pool size
    pub fn hybrid_synthetic_count(&self, real_count: usize, pool_size: usize) -> usize {
        let wanted = (real_count as f64 * self.synthetic_weight / self.real_weight).round() as usize;
        wanted.min(pool_size)
    }
}

#[derive(Debug, Clone)]
pub struct BlendResult {
    pub table: FeatureTable,
    pub source: DataSource,
    pub real_count: usize,
    pub synthetic_count: usize,
}

pub struct DataBlender {
    schema: FeatureSchema,
    policy: BlendPolicy,
}

impl DataBlender {
    pub fn new(schema: FeatureSchema, policy: BlendPolicy) -> Self {
        Self { schema, policy }
    }

    pub fn policy(&self) -> &BlendPolicy {
        &self.policy
    }

    pub fn blend(&self, real: Option<&FeatureTable>, synthetic: &FeatureTable) -> RetrainResult<BlendResult> {
        self.schema.ensure_matches(synthetic.schema())?;
        if let Some(r) = real {
            self.schema.ensure_matches(r.schema())?;
        }

        let real_count = real.map_or(0, |r| r.n_rows());

        let result = match (self.policy.tier(real_count), real) {
            (DataSource::Real, Some(real)) => BlendResult {
                table: real.clone(),
                source: DataSource::Real,
                real_count,
                synthetic_count: 0,
            },
            (DataSource::Hybrid, Some(real)) => {
                let k = self.policy.hybrid_synthetic_count(real_count, synthetic.n_rows());
                let mut rng = StdRng::seed_from_u64(self.policy.seed);
                let picked = rand::seq::index::sample(&mut rng, synthetic.n_rows(), k).into_vec();
                let table = real.concat(&synthetic.select_rows(&picked))?;
                BlendResult {
                    table,
                    source: DataSource::Hybrid,
                    real_count,
                    synthetic_count: k,
                }
            }
            _ => BlendResult {
                table: synthetic.clone(),
                source: DataSource::Synthetic,
                real_count: 0,
                synthetic_count: synthetic.n_rows(),
            },
        };

        if result.source == DataSource::Synthetic && real_count > 0 {
            log::info!(
                "Only {} real rows (< {}), training on synthetic data",
                real_count,
                self.policy.min_hybrid
            );
        }
        log::info!(
            "Blended {} rows for {}: source={}, real={}, synthetic={}",
            result.table.n_rows(),
            self.schema.document_type,
            result.source,
            result.real_count,
            result.synthetic_count
        );

        Ok(result)
    }
}
