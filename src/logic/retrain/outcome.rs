//! Retrain Outcome - structured result of one `retrain()` run

use serde::{Deserialize, Serialize};

use crate::logic::dataset::DataSource;
use crate::logic::training::VersionMetrics;
use crate::logic::versioning::{ActivationDecision, TrainingDataInfo};

/// Closed set of ways a run can end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// New version promoted and serving
    Activated,
    /// Trained and recorded, but worse than the active version
    RegressionRejected,
    /// Blended data failed the quality gate; nothing trained
    QualityRejected,
    /// Model fitting failed; nothing persisted
    TrainingFailed,
    /// History, artifacts or pointer could not be written
    PersistenceFailed,
    /// Run did not start: lock held or no data at all
    Unavailable,
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Activated | OutcomeKind::RegressionRejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Activated => "activated",
            OutcomeKind::RegressionRejected => "regression_rejected",
            OutcomeKind::QualityRejected => "quality_rejected",
            OutcomeKind::TrainingFailed => "training_failed",
            OutcomeKind::PersistenceFailed => "persistence_failed",
            OutcomeKind::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub run_id: String,
    pub document_type: String,
    pub kind: OutcomeKind,
    pub success: bool,
    pub activated: bool,
    pub version_id: Option<String>,
    pub metrics: Option<VersionMetrics>,
    pub data_source: Option<DataSource>,
    pub training_data_info: Option<TrainingDataInfo>,
    pub decision: Option<ActivationDecision>,
    /// Why the run ended the way it did, for anything but a plain activation
    pub reason: Option<String>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl RetrainOutcome {
    pub(crate) fn start(run_id: &str, document_type: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            document_type: document_type.to_string(),
            kind: OutcomeKind::Unavailable,
            success: false,
            activated: false,
            version_id: None,
            metrics: None,
            data_source: None,
            training_data_info: None,
            decision: None,
            reason: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self, kind: OutcomeKind) -> Self {
        self.kind = kind;
        self.success = kind.is_success();
        self.activated = kind == OutcomeKind::Activated;
        self
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", self.run_id, message);
        self.warnings.push(message);
    }
}
