//! JSONL Real Data Provider
//!
//! Reads labeled documents exported by the operational store, one JSON
//! record per line. Only rows with a trustworthy label reach training:
//! confidence at or above the floor and an actionable recommendation.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::RealDataProvider;
use crate::logic::error::RetrainResult;
use crate::logic::features::table::{RISK_MAX, RISK_MIN};
use crate::logic::features::{FeatureSchema, FeatureTable};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.8;

/// Recommendation labels that count as a usable review outcome
const USABLE_RECOMMENDATIONS: &[&str] = &["approve", "review", "reject"];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LabeledRecord {
    pub document_id: String,
    pub document_type: String,

    // Named feature values from the vectorizer
    pub features: HashMap<String, f64>,

    // Reviewer label
    #[serde(default)]
    pub risk_score: Option<f64>,
    pub confidence: f64,
    #[serde(default)]
    pub recommendation: Option<String>,

    #[serde(default)]
    pub labeled_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl LabeledRecord {
    fn has_usable_label(&self, min_confidence: f64) -> bool {
        let usable = self
            .recommendation
            .as_deref()
            .map(|r| USABLE_RECOMMENDATIONS.contains(&r.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        usable
            && self.confidence >= min_confidence
            && self
                .risk_score
                .map_or(false, |r| r.is_finite() && (RISK_MIN..=RISK_MAX).contains(&r))
    }

    /// Feature values in schema order; `None` if any is missing or non-finite
    fn to_row(&self, schema: &FeatureSchema) -> Option<Vec<f64>> {
        schema
            .fields
            .iter()
            .map(|name| self.features.get(name).copied().filter(|v| v.is_finite()))
            .collect()
    }
}

/// Skipped-row counters for one fetch
#[derive(Debug, Default, Clone, Copy)]
struct FetchStats {
    lines: usize,
    malformed: usize,
    other_type: usize,
    low_trust: usize,
    incomplete: usize,
}

pub struct JsonlRealDataProvider {
    path: PathBuf,
    schema: FeatureSchema,
    min_confidence: f64,
}

impl JsonlRealDataProvider {
    pub fn new(path: impl Into<PathBuf>, schema: FeatureSchema) -> Self {
        Self {
            path: path.into(),
            schema,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl RealDataProvider for JsonlRealDataProvider {
    fn fetch(&self) -> RetrainResult<Option<FeatureTable>> {
        if !self.path.exists() {
            log::info!("No labeled export at {}", self.path.display());
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut stats = FetchStats::default();
        let mut rows = Vec::new();
        let mut risk = Vec::new();

        // Split on raw bytes so one non-UTF-8 line is skipped, not fatal
        for line in reader.split(b'\n') {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            stats.lines += 1;

            let record = match serde_json::from_slice::<LabeledRecord>(&line) {
                Ok(r) => r,
                Err(_) => {
                    stats.malformed += 1;
                    continue;
                }
            };
            if record.document_type != self.schema.document_type {
                stats.other_type += 1;
                continue;
            }
            if !record.has_usable_label(self.min_confidence) {
                stats.low_trust += 1;
                continue;
            }
            match (record.to_row(&self.schema), record.risk_score) {
                (Some(row), Some(r)) => {
                    rows.push(row);
                    risk.push(r);
                }
                _ => stats.incomplete += 1,
            }
        }

        log::info!(
            "Read {} labeled rows for {} from {} ({} lines, {} malformed, {} other type, {} low trust, {} incomplete)",
            rows.len(),
            self.schema.document_type,
            self.path.display(),
            stats.lines,
            stats.malformed,
            stats.other_type,
            stats.low_trust,
            stats.incomplete
        );

        if rows.is_empty() {
            return Ok(None);
        }
        FeatureTable::from_rows(self.schema.clone(), rows, risk).map(Some)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn schema() -> FeatureSchema {
        FeatureSchema::new("invoice", 1, &["a", "b"])
    }

    fn record(id: &str, confidence: f64, recommendation: Option<&str>) -> LabeledRecord {
        let mut features = HashMap::new();
        features.insert("a".to_string(), 1.0);
        features.insert("b".to_string(), 2.0);
        LabeledRecord {
            document_id: id.to_string(),
            document_type: "invoice".to_string(),
            features,
            risk_score: Some(85.0),
            confidence,
            recommendation: recommendation.map(|s| s.to_string()),
            labeled_at: None,
        }
    }

    fn write_lines(path: &std::path::Path, lines: &[String]) {
        let mut f = File::create(path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
    }

    #[test]
    fn test_missing_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JsonlRealDataProvider::new(dir.path().join("none.jsonl"), schema());
        assert!(provider.fetch().unwrap().is_none());
    }

    #[test]
    fn test_filters_untrusted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");

        let mut other = record("x", 0.99, Some("approve"));
        other.document_type = "bank_statement".to_string();
        let mut partial = record("y", 0.99, Some("reject"));
        partial.features.remove("b");

        let lines = vec![
            serde_json::to_string(&record("ok-1", 0.95, Some("Reject"))).unwrap(),
            serde_json::to_string(&record("ok-2", 0.80, Some("approve"))).unwrap(),
            serde_json::to_string(&record("low", 0.50, Some("approve"))).unwrap(),
            serde_json::to_string(&record("nolabel", 0.99, None)).unwrap(),
            serde_json::to_string(&record("pending", 0.99, Some("pending"))).unwrap(),
            serde_json::to_string(&other).unwrap(),
            serde_json::to_string(&partial).unwrap(),
            "{not json".to_string(),
        ];
        write_lines(&path, &lines);

        let table = JsonlRealDataProvider::new(&path, schema())
            .fetch()
            .unwrap()
            .unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.row(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(table.risk().unwrap(), &[85.0, 85.0]);
    }

    #[test]
    fn test_skips_invalid_utf8_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");
        let mut f = File::create(&path).unwrap();
        for i in 0..6 {
            let line = serde_json::to_string(&record(&format!("ok-{}", i), 0.9, Some("reject"))).unwrap();
            writeln!(f, "{}", line).unwrap();
            if i == 2 {
                f.write_all(b"\xff\xfe\n").unwrap();
            }
        }
        drop(f);

        let table = JsonlRealDataProvider::new(&path, schema())
            .fetch()
            .unwrap()
            .unwrap();
        assert_eq!(table.n_rows(), 6);
    }

    #[test]
    fn test_out_of_range_risk_is_not_admitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");

        let mut high = record("high", 0.9, Some("reject"));
        high.risk_score = Some(150.0);
        let mut negative = record("negative", 0.9, Some("approve"));
        negative.risk_score = Some(-5.0);
        let mut edge = record("edge", 0.9, Some("reject"));
        edge.risk_score = Some(100.0);
        write_lines(
            &path,
            &[
                serde_json::to_string(&high).unwrap(),
                serde_json::to_string(&negative).unwrap(),
                serde_json::to_string(&edge).unwrap(),
            ],
        );

        let table = JsonlRealDataProvider::new(&path, schema())
            .fetch()
            .unwrap()
            .unwrap();
        assert_eq!(table.risk().unwrap(), &[100.0]);
    }

    #[test]
    fn test_all_rows_filtered_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.jsonl");
        write_lines(
            &path,
            &[serde_json::to_string(&record("low", 0.1, Some("approve"))).unwrap()],
        );
        let provider = JsonlRealDataProvider::new(&path, schema()).with_min_confidence(0.9);
        assert!(provider.fetch().unwrap().is_none());
    }
}
