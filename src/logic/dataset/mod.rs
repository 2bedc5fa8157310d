//! Dataset Module - Training set assembly (blend + quality gate)
//!
//! Turns the raw provider output into the one table a version is trained on.

pub mod blend;
pub mod validate;


pub use blend::{BlendPolicy, BlendResult, DataBlender, DataSource};
pub use validate::{DataQualityValidator, QualityThresholds, ValidationReport};
