//! Data Quality Validator - Hard gate before training
//!
//! Hard checks run in order and the first failure wins. Soft checks only
//! produce warnings.

use serde::{Deserialize, Serialize};

use crate::logic::config::RetrainConfig;
use crate::logic::features::table::{RISK_MAX, RISK_MIN};
use crate::logic::features::{ClassCounts, FeatureTable};

const FRAUD_RATIO_WARN_LOW: f64 = 0.05;
const FRAUD_RATIO_WARN_HIGH: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub min_samples_for_training: usize,
    pub min_samples_per_class: usize,
}

impl QualityThresholds {
    pub fn from_config(config: &RetrainConfig) -> Self {
        Self {
            min_samples_for_training: config.min_samples_for_training,
            min_samples_per_class: config.min_samples_per_class,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
    pub counts: ClassCounts,
}

impl ValidationReport {
    fn reject(reason: String, counts: ClassCounts) -> Self {
        log::error!("Data quality check failed: {}", reason);
        Self {
            ok: false,
            reason: Some(reason),
            warnings: Vec::new(),
            counts,
        }
    }
}

pub struct DataQualityValidator {
    thresholds: QualityThresholds,
}

impl DataQualityValidator {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn validate(&self, table: &FeatureTable) -> ValidationReport {
        let t = &self.thresholds;
        let total = table.n_rows();
        let counts = table.class_counts();

        if total < t.min_samples_for_training {
            return ValidationReport::reject(
                format!(
                    "insufficient samples: {} < {} required",
                    total, t.min_samples_for_training
                ),
                counts,
            );
        }

        let risk = match table.risk() {
            Some(r) if r.len() == total => r,
            _ => {
                return ValidationReport::reject(
                    "target column 'risk_score' is missing".to_string(),
                    counts,
                )
            }
        };
        if let Some(bad) = risk.iter().find(|r| !r.is_finite() || **r < RISK_MIN || **r > RISK_MAX) {
            return ValidationReport::reject(
                format!("risk_score {} outside [{}, {}]", bad, RISK_MIN, RISK_MAX),
                counts,
            );
        }

        if counts.legitimate < t.min_samples_per_class {
            return ValidationReport::reject(
                format!(
                    "insufficient legitimate samples: {} < {} required",
                    counts.legitimate, t.min_samples_per_class
                ),
                counts,
            );
        }
        if counts.fraud < t.min_samples_per_class {
            return ValidationReport::reject(
                format!(
                    "insufficient fraud samples: {} < {} required",
                    counts.fraud, t.min_samples_per_class
                ),
                counts,
            );
        }

        let mut warnings = Vec::new();
        let ratio = counts.fraud_ratio();
        if !(FRAUD_RATIO_WARN_LOW..=FRAUD_RATIO_WARN_HIGH).contains(&ratio) {
            warnings.push(format!("fraud ratio {:.1}% outside [5%, 95%]", ratio * 100.0));
        }
        for name in table.constant_columns() {
            warnings.push(format!("feature '{}' is constant across all rows", name));
        }
        for w in &warnings {
            log::warn!("Data quality warning: {}", w);
        }

        log::info!(
            "Data quality OK: {} rows ({} legitimate, {} suspicious, {} fraud)",
            total,
            counts.legitimate,
            counts.suspicious,
            counts.fraud
        );

        ValidationReport {
            ok: true,
            reason: None,
            warnings,
            counts,
        }
    }
}
