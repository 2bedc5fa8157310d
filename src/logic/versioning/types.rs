//! Versioning Types - history records, summaries, artifact envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::dataset::{BlendResult, DataSource};
use crate::logic::features::ClassCounts;
use crate::logic::training::VersionMetrics;

// ============================================================================
// HISTORY RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataInfo {
    pub total: usize,
    pub real_count: usize,
    pub synthetic_count: usize,
    pub fraud_count: usize,
    pub fraud_ratio: f64,
}

impl TrainingDataInfo {
    pub fn from_blend(blend: &BlendResult, counts: &ClassCounts) -> Self {
        Self {
            total: blend.table.n_rows(),
            real_count: blend.real_count,
            synthetic_count: blend.synthetic_count,
            fraud_count: counts.fraud,
            fraud_ratio: counts.fraud_ratio(),
        }
    }
}

/// One trained model version of a document type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Sortable UTC timestamp, e.g. `20260301T120000.000123Z`
    pub version_id: String,
    pub timestamp: DateTime<Utc>,
    pub data_source: DataSource,
    pub training_data_info: TrainingDataInfo,
    pub metrics: VersionMetrics,
    /// Layout hash of the feature schema the version was trained on
    pub schema_hash: u32,
    pub is_active: bool,
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_id: String,
    pub timestamp: DateTime<Utc>,
    pub data_source: DataSource,
    pub r2_score: f64,
    pub mse: f64,
    pub is_active: bool,
    pub training_samples: usize,
}

impl From<&ModelVersion> for VersionSummary {
    fn from(v: &ModelVersion) -> Self {
        Self {
            version_id: v.version_id.clone(),
            timestamp: v.timestamp,
            data_source: v.data_source,
            r2_score: v.metrics.r2_score,
            mse: v.metrics.mse,
            is_active: v.is_active,
            training_samples: v.training_data_info.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub document_type: String,
    pub total_versions: usize,
    pub active_version: Option<String>,
    pub versions: Vec<VersionSummary>,
}

// ============================================================================
// PROMOTION DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationDecision {
    pub should_activate: bool,
    pub reason: String,
    pub previous_version: Option<String>,
    pub previous_r2: Option<f64>,
    /// `new_r2 - previous_r2`, when there is a previous active version
    pub delta: Option<f64>,
}

// ============================================================================
// ARTIFACTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    ModelA,
    ModelB,
    Scaler,
}

impl ArtifactRole {
    pub const ALL: [ArtifactRole; 3] = [ArtifactRole::ModelA, ArtifactRole::ModelB, ArtifactRole::Scaler];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::ModelA => "model_a",
            ArtifactRole::ModelB => "model_b",
            ArtifactRole::Scaler => "scaler",
        }
    }
}

/// On-disk wrapper around one serialized artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub format_version: u32,
    pub document_type: String,
    pub role: ArtifactRole,
    pub version_id: String,
    pub schema_hash: u32,
    /// SHA-256 (hex) of the serialized payload
    pub checksum: String,
    pub payload: serde_json::Value,
}
