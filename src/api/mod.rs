//! API Module
//!
//! Structure:
//! - commands.rs: retrain / summary / rollback / cleanup / verify
//!
//! Usage:
//! - `api::commands::retrain(&settings, "invoice", &source)`

pub mod commands;

pub use commands::*;
