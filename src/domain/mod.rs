//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - simulation configuration (`SimConfig`, `PopulationParams`)
//! - simulated values (`Individual`, `Observation`, `Trajectory`, `Dataset`)
//! - the flattened table consumed by fitting backends (`CtTable`)
//! - regression/prior/sampler configuration and diagnostics
//! - prediction and comparison row types

pub mod types;

pub use types::*;
