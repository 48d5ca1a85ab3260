//! Model fitting.
//!
//! Responsibilities:
//!
//! - the backend seam the pipeline programs against (`backend`)
//! - design-matrix layout shared by fitting and prediction (`design`)
//! - the built-in conjugate Gaussian backend (`conjugate`)
//! - convergence diagnostics computed from draw chains (`diagnostics`)

pub mod backend;
pub mod conjugate;
pub mod design;
pub mod diagnostics;

pub use backend::*;
pub use conjugate::*;
pub use design::*;
