//! Process-wide error type.
//!
//! Exit-code convention:
//!
//! - `2` — invalid parameter (bad simulation/fitting/query configuration,
//!   unreadable files); raised before any sampling happens
//! - `3` — insufficient data (empty table, underdetermined fit)
//! - `4` — backend failure (numerical breakdown inside a fit/predict call)
//!
//! Convergence warnings are not errors: a fit with poor diagnostics is still
//! returned, carrying its `FitDiagnostics` report.

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// Whether this error came from parameter validation (exit code 2).
    pub fn is_invalid_parameter(&self) -> bool {
        self.exit_code == 2
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
