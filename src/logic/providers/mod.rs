//! Providers Module - Training Data Sources
//!
//! The engine never talks to the document store or a generator directly;
//! both sit behind these traits and are injected per document type.
//!
//! - `synthetic.rs`: seeded profile-driven generator (built-in profiles)
//! - `jsonl.rs`: reader for labeled records exported by the operational store

pub mod jsonl;
pub mod synthetic;

use crate::logic::error::RetrainResult;
use crate::logic::features::{FeatureSchema, FeatureTable};

pub use jsonl::{JsonlRealDataProvider, LabeledRecord};
pub use synthetic::{FeatureProfile, ProfileSyntheticProvider, SyntheticProfile};

/// Source of high-confidence labeled rows from the operational store
pub trait RealDataProvider {
    /// `Ok(None)` means no real data exists yet
    fn fetch(&self) -> RetrainResult<Option<FeatureTable>>;
}

/// Source of fully labeled synthetic rows
pub trait SyntheticDataProvider {
    fn schema(&self) -> &FeatureSchema;

    /// Up to `n` rows in the provider's schema
    fn generate(&self, n: usize) -> FeatureTable;
}

/// Real data provider for deployments without an operational store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRealData;

impl RealDataProvider for NoRealData {
    fn fetch(&self) -> RetrainResult<Option<FeatureTable>> {
        Ok(None)
    }
}
