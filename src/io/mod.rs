//! Input/output helpers.
//!
//! - table exports (CSV) (`export`)
//! - fit summary JSON read/write (`summary`)

pub mod export;
pub mod summary;

pub use export::*;
pub use summary::*;
