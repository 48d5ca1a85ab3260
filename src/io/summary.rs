//! Read/write fit-summary JSON files.
//!
//! The summary JSON is the "portable" representation of a fit:
//! fixed-effect posteriors, residual sd, and the diagnostics report.
//! The schema is defined by `fit::FitSummary`.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::fit::FitSummary;

/// Write a fit summary JSON file.
pub fn write_summary_json(path: &Path, summary: &FitSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

/// Read a fit summary JSON file.
pub fn read_summary_json(path: &Path) -> Result<FitSummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let summary: FitSummary =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitDiagnostics;
    use crate::fit::CoefficientSummary;

    #[test]
    fn summary_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let summary = FitSummary {
            label: "rand_slope".to_string(),
            random_effects: "random intercept+slope".to_string(),
            n_obs: 120,
            n_individuals: 10,
            coefficients: vec![CoefficientSummary {
                name: "intercept".to_string(),
                mean: 17.9,
                sd: 0.6,
                q025: 16.7,
                q975: 19.1,
            }],
            sigma_mean: 2.95,
            diagnostics: FitDiagnostics {
                max_rhat: 1.001,
                min_ess_bulk: 1_800.0,
                min_ess_tail: 1_650.0,
                n_chains: 4,
                n_draws: 2_000,
            },
            reliable: true,
        };

        write_summary_json(&path, &summary).unwrap();
        let loaded = read_summary_json(&path).unwrap();
        assert_eq!(loaded.label, summary.label);
        assert_eq!(loaded.coefficients.len(), 1);
        assert!(loaded.reliable);
    }
}
