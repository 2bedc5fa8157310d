//! Features Module - Feature Schemas & Labeled Tables
//!
//! Fixed feature schema per document type. Every training table carries
//! the schema it was built against.

pub mod layout;
pub mod table;


// Re-export common types
pub use layout::{validate_document_type, DocumentKind, FeatureSchema, LayoutInfo};
pub use table::{ClassCounts, FeatureTable, FRAUD_MIN_RISK, LEGITIMATE_MAX_RISK};
