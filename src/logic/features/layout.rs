//! Feature Layout - Per-Document Feature Schema
//!
//! **This file controls the feature schema of every document type**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment the layout version
//! 2. Change order → increment the layout version
//! 3. Remove feature → increment the layout version
//!
//! The CRC32 layout hash travels with every trained artifact so a model is
//! never loaded against a vectorizer that produces a different column order.

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::logic::error::{RetrainError, RetrainResult};

// ============================================================================
// BUILT-IN LAYOUTS (Authoritative source)
// ============================================================================

pub const INVOICE_LAYOUT_VERSION: u8 = 1;

/// Invoice features in exact vector order
pub const INVOICE_LAYOUT: &[&str] = &[
    "amount_total_log",         // 0: log10 of the invoice total
    "line_item_count",          // 1: Number of extracted line items
    "tax_rate_deviation",       // 2: |declared tax rate - expected rate|
    "vendor_age_days",          // 3: Days since vendor first seen
    "duplicate_similarity",     // 4: Max similarity to a previously seen invoice
    "round_amount_ratio",       // 5: Share of line amounts that are round numbers
    "date_anomaly_score",       // 6: Issue/due date inconsistencies
    "ocr_confidence",           // 7: Mean extraction confidence
];

pub const BANK_STATEMENT_LAYOUT_VERSION: u8 = 1;

/// Bank statement features in exact vector order
pub const BANK_STATEMENT_LAYOUT: &[&str] = &[
    "balance_consistency_error", // 0: Running balance mismatch (normalized)
    "transaction_count",         // 1: Number of transactions on the statement
    "avg_transaction_log",       // 2: log10 of the mean transaction amount
    "large_deposit_ratio",       // 3: Share of deposits above the account norm
    "font_inconsistency_score",  // 4: Typography drift across the document
    "metadata_edit_score",       // 5: PDF producer/edit trail suspicion
    "round_number_ratio",        // 6: Share of round-number transactions
    "ocr_confidence",            // 7: Mean extraction confidence
];

static DOCUMENT_TYPE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_\-]{0,63}$").expect("static regex")
});

/// Document type keys become directory and file name components.
pub fn validate_document_type(key: &str) -> RetrainResult<()> {
    if DOCUMENT_TYPE_KEY.is_match(key) {
        Ok(())
    } else {
        Err(RetrainError::InvalidDocumentType(key.to_string()))
    }
}

// ============================================================================
// FEATURE SCHEMA
// ============================================================================

/// Ordered, named feature columns for one document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub document_type: String,
    pub version: u8,
    pub fields: Vec<String>,
}

impl FeatureSchema {
    pub fn new(document_type: &str, version: u8, fields: &[&str]) -> Self {
        Self {
            document_type: document_type.to_string(),
            version,
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// CRC32 over version, document type and ordered field names
    pub fn layout_hash(&self) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&[self.version]);
        hasher.update(self.document_type.as_bytes());
        hasher.update(&[0]);
        for name in &self.fields {
            hasher.update(name.as_bytes());
            hasher.update(&[0]); // Separator
        }
        hasher.finalize()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|n| n == name)
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|s| s.as_str())
    }

    /// Fails unless `other` has the same document type, version and column order
    pub fn ensure_matches(&self, other: &FeatureSchema) -> RetrainResult<()> {
        if self.layout_hash() == other.layout_hash() && self == other {
            return Ok(());
        }
        Err(RetrainError::SchemaMismatch {
            expected: self.describe(),
            expected_hash: self.layout_hash(),
            actual: other.describe(),
            actual_hash: other.layout_hash(),
        })
    }

    pub fn describe(&self) -> String {
        format!("{} v{} ({} features)", self.document_type, self.version, self.len())
    }

    pub fn info(&self) -> LayoutInfo {
        LayoutInfo {
            document_type: self.document_type.clone(),
            version: self.version,
            hash: self.layout_hash(),
            feature_count: self.len(),
            feature_names: self.fields.clone(),
        }
    }
}

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub document_type: String,
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

// ============================================================================
// DOCUMENT KINDS
// ============================================================================

/// Document types shipped with a built-in schema and synthetic profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    BankStatement,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Invoice, DocumentKind::BankStatement];

    pub fn key(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::BankStatement => "bank_statement",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == key)
    }

    pub fn schema(&self) -> FeatureSchema {
        match self {
            DocumentKind::Invoice => {
                FeatureSchema::new(self.key(), INVOICE_LAYOUT_VERSION, INVOICE_LAYOUT)
            }
            DocumentKind::BankStatement => FeatureSchema::new(
                self.key(),
                BANK_STATEMENT_LAYOUT_VERSION,
                BANK_STATEMENT_LAYOUT,
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_hash_consistency() {
        let schema = DocumentKind::Invoice.schema();
        assert_eq!(schema.layout_hash(), schema.layout_hash());
        assert_ne!(schema.layout_hash(), 0);
    }

    #[test]
    fn test_layout_hash_changes_with_order() {
        let a = FeatureSchema::new("invoice", 1, &["a", "b"]);
        let b = FeatureSchema::new("invoice", 1, &["b", "a"]);
        assert_ne!(a.layout_hash(), b.layout_hash());
    }

    #[test]
    fn test_layout_hash_changes_with_version() {
        let a = FeatureSchema::new("invoice", 1, &["a", "b"]);
        let b = FeatureSchema::new("invoice", 2, &["a", "b"]);
        assert!(a.ensure_matches(&b).is_err());
    }

    #[test]
    fn test_ensure_matches_same_schema() {
        let a = DocumentKind::BankStatement.schema();
        assert!(a.ensure_matches(&DocumentKind::BankStatement.schema()).is_ok());
        assert!(a.ensure_matches(&DocumentKind::Invoice.schema()).is_err());
    }

    #[test]
    fn test_feature_index() {
        let schema = DocumentKind::Invoice.schema();
        assert_eq!(schema.index_of("amount_total_log"), Some(0));
        assert_eq!(schema.index_of("ocr_confidence"), Some(7));
        assert_eq!(schema.index_of("nonexistent"), None);
        assert_eq!(schema.name_at(1), Some("line_item_count"));
        assert_eq!(schema.name_at(100), None);
    }

    #[test]
    fn test_document_kind_roundtrip_key() {
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_key(kind.key()), Some(kind));
            assert_eq!(kind.schema().document_type, kind.key());
        }
        assert_eq!(DocumentKind::from_key("passport"), None);
    }

    #[test]
    fn test_validate_document_type() {
        assert!(validate_document_type("invoice").is_ok());
        assert!(validate_document_type("bank_statement-v2").is_ok());
        assert!(validate_document_type("../etc").is_err());
        assert!(validate_document_type("").is_err());
        assert!(validate_document_type("Invoice").is_err());
    }
}
