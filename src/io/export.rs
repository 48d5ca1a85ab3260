//! Export tables to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets, notebooks,
//! or downstream plotting scripts; no bit-exact format beyond plain
//! delimited text is promised.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{ComparisonRow, CtTable};
use crate::error::AppError;

/// Write a flattened dataset to CSV.
pub fn write_dataset_csv(path: &Path, table: &CtTable) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create dataset CSV '{}': {e}", path.display())))?;

    writeln!(file, "individual_id,time,observed_ct")
        .map_err(|e| AppError::new(2, format!("Failed to write dataset CSV header: {e}")))?;

    for row in &table.rows {
        writeln!(file, "{},{},{:.6}", row.individual_id, row.time, row.observed_ct)
            .map_err(|e| AppError::new(2, format!("Failed to write dataset CSV row: {e}")))?;
    }

    Ok(())
}

/// Write an aligned comparison to CSV.
///
/// Null ground truth becomes an empty field, keeping key mismatches visible
/// to downstream consumers.
pub fn write_comparison_csv(path: &Path, rows: &[ComparisonRow]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create comparison CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "label,individual_id,time,point_estimate,lower_bound,upper_bound,ground_truth"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write comparison CSV header: {e}")))?;

    for row in rows {
        writeln!(
            file,
            "{},{},{},{:.6},{:.6},{:.6},{}",
            row.label,
            row.individual_id,
            row.time,
            row.point_estimate,
            row.lower_bound,
            row.upper_bound,
            row.ground_truth.map(|v| format!("{v:.6}")).unwrap_or_default(),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write comparison CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CtRow;

    #[test]
    fn dataset_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let table = CtTable {
            rows: vec![CtRow { individual_id: 1, time: 0, observed_ct: 18.25 }],
        };

        write_dataset_csv(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "individual_id,time,observed_ct");
        assert_eq!(lines.next().unwrap(), "1,0,18.250000");
    }

    #[test]
    fn comparison_csv_leaves_null_truth_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmp.csv");
        let rows = vec![ComparisonRow {
            label: "pooled".to_string(),
            individual_id: 7,
            time: 3,
            point_estimate: 24.5,
            lower_bound: 19.0,
            upper_bound: 30.0,
            ground_truth: None,
        }];

        write_comparison_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(','));
    }
}
