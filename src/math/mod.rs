//! Mathematical utilities: least squares and summary statistics.

pub mod linalg;
pub mod stats;

pub use linalg::*;
pub use stats::*;
