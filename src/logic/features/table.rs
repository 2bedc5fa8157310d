//! Feature Table - Labeled training data
//!
//! Rectangular dataset: one row per labeled document, one column per schema
//! field, plus the 0-100 risk score target.

use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::layout::FeatureSchema;
use crate::logic::error::{RetrainError, RetrainResult};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const RISK_MIN: f64 = 0.0;
pub const RISK_MAX: f64 = 100.0;
/// Rows at or below this risk are the legitimate class
pub const LEGITIMATE_MAX_RISK: f64 = 30.0;
/// Rows at or above this risk are the fraud class
pub const FRAUD_MIN_RISK: f64 = 70.0;

// ============================================================================
// FEATURE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    features: Array2<f64>,
    risk: Option<Vec<f64>>,
}

/// Class bucket counts of a table's target column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub legitimate: usize,
    pub suspicious: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.legitimate + self.suspicious + self.fraud
    }

    pub fn fraud_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.fraud as f64 / total as f64
        }
    }
}

impl FeatureTable {
    /// Labeled table; `risk` must hold one value per row
    pub fn new(schema: FeatureSchema, features: Array2<f64>, risk: Vec<f64>) -> RetrainResult<Self> {
        check_width(&schema, features.ncols())?;
        if risk.len() != features.nrows() {
            return Err(RetrainError::DataQuality(format!(
                "target has {} values for {} rows",
                risk.len(),
                features.nrows()
            )));
        }
        Ok(Self { schema, features, risk: Some(risk) })
    }

    /// Table whose provider delivered no target column
    pub fn unlabeled(schema: FeatureSchema, features: Array2<f64>) -> RetrainResult<Self> {
        check_width(&schema, features.ncols())?;
        Ok(Self { schema, features, risk: None })
    }

    pub fn empty(schema: FeatureSchema) -> Self {
        let width = schema.len();
        Self {
            schema,
            features: Array2::zeros((0, width)),
            risk: Some(Vec::new()),
        }
    }

    pub fn from_rows(schema: FeatureSchema, rows: Vec<Vec<f64>>, risk: Vec<f64>) -> RetrainResult<Self> {
        let width = schema.len();
        let n_rows = rows.len();
        let mut flat = Vec::with_capacity(n_rows * width);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(RetrainError::DataQuality(format!(
                    "row {} has {} values, schema {} expects {}",
                    i,
                    row.len(),
                    schema.describe(),
                    width
                )));
            }
            flat.extend(row);
        }
        let features = Array2::from_shape_vec((n_rows, width), flat)
            .map_err(|e| RetrainError::DataQuality(format!("Array error: {}", e)))?;
        Self::new(schema, features, risk)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn risk(&self) -> Option<&[f64]> {
        self.risk.as_deref()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.features.row(index)
    }

    /// Copy of the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            features: self.features.select(Axis(0), indices),
            risk: self
                .risk
                .as_ref()
                .map(|r| indices.iter().map(|&i| r[i]).collect()),
        }
    }

    /// Rows of `self` followed by rows of `other`
    pub fn concat(&self, other: &FeatureTable) -> RetrainResult<Self> {
        self.schema.ensure_matches(&other.schema)?;
        let features = concatenate(Axis(0), &[self.features.view(), other.features.view()])
            .map_err(|e| RetrainError::DataQuality(format!("Array error: {}", e)))?;
        let risk = match (&self.risk, &other.risk) {
            (Some(a), Some(b)) => Some(a.iter().chain(b.iter()).copied().collect()),
            _ => None,
        };
        Ok(Self {
            schema: self.schema.clone(),
            features,
            risk,
        })
    }

    pub fn class_counts(&self) -> ClassCounts {
        let mut counts = ClassCounts::default();
        for &r in self.risk.as_deref().unwrap_or(&[]) {
            if r <= LEGITIMATE_MAX_RISK {
                counts.legitimate += 1;
            } else if r >= FRAUD_MIN_RISK {
                counts.fraud += 1;
            } else {
                counts.suspicious += 1;
            }
        }
        counts
    }

    /// Names of feature columns holding a single value across all rows
    pub fn constant_columns(&self) -> Vec<String> {
        if self.n_rows() < 2 {
            return Vec::new();
        }
        self.features
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| {
                let first = col[0];
                col.iter().all(|&v| v == first)
            })
            .filter_map(|(i, _)| self.schema.name_at(i).map(|s| s.to_string()))
            .collect()
    }

    pub fn has_non_finite_features(&self) -> bool {
        self.features.iter().any(|v| !v.is_finite())
    }
}

fn check_width(schema: &FeatureSchema, ncols: usize) -> RetrainResult<()> {
    if ncols != schema.len() {
        return Err(RetrainError::DataQuality(format!(
            "expected {} feature columns for {}, got {}",
            schema.len(),
            schema.describe(),
            ncols
        )));
    }
    Ok(())
}
