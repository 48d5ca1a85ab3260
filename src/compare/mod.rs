//! Prediction & comparison harness.
//!
//! Aligns any number of labeled prediction sets with ground truth by
//! `(individual_id, time)` for downstream visualization. Key mismatches stay
//! explicit (`ground_truth: None`); no rows are silently dropped.

use std::collections::HashMap;

use crate::domain::{ComparisonRow, CtTable, PredictionSet};
use crate::math::mean;

/// One model's predictions under a display label.
#[derive(Debug, Clone)]
pub struct LabeledPredictions {
    pub label: String,
    pub set: PredictionSet,
}

/// Join each labeled prediction set to ground truth.
///
/// Produces exactly `Σ |set.rows|` entries, in set order then row order.
pub fn align(sets: &[LabeledPredictions], truth: &CtTable) -> Vec<ComparisonRow> {
    let lookup: HashMap<(u32, u32), f64> = truth
        .rows
        .iter()
        .map(|r| ((r.individual_id, r.time), r.observed_ct))
        .collect();

    let mut out = Vec::with_capacity(sets.iter().map(|s| s.set.rows.len()).sum());
    for labeled in sets {
        for row in &labeled.set.rows {
            out.push(ComparisonRow {
                label: labeled.label.clone(),
                individual_id: row.individual_id,
                time: row.time,
                point_estimate: row.point,
                lower_bound: row.lower,
                upper_bound: row.upper,
                ground_truth: lookup.get(&(row.individual_id, row.time)).copied(),
            });
        }
    }
    out
}

/// Per-label aggregate view of an aligned comparison.
#[derive(Debug, Clone)]
pub struct LabelSummary {
    pub label: String,
    pub n_rows: usize,
    /// Rows with a matching truth value.
    pub n_matched: usize,
    /// Mean absolute error over matched rows.
    pub mae: Option<f64>,
    /// Fraction of matched truth values inside `[lower, upper]`.
    pub coverage: Option<f64>,
    pub mean_interval_width: f64,
}

/// Summarize an aligned comparison per label, preserving label order.
pub fn summarize(rows: &[ComparisonRow]) -> Vec<LabelSummary> {
    let mut order: Vec<&str> = Vec::new();
    for row in rows {
        if !order.contains(&row.label.as_str()) {
            order.push(&row.label);
        }
    }

    order
        .iter()
        .map(|&label| {
            let group: Vec<&ComparisonRow> = rows.iter().filter(|r| r.label == label).collect();
            let widths: Vec<f64> = group.iter().map(|r| r.upper_bound - r.lower_bound).collect();

            let matched: Vec<(&ComparisonRow, f64)> = group
                .iter()
                .filter_map(|r| r.ground_truth.map(|t| (*r, t)))
                .collect();
            let (mae, coverage) = if matched.is_empty() {
                (None, None)
            } else {
                let errors: Vec<f64> = matched
                    .iter()
                    .map(|(r, t)| (r.point_estimate - t).abs())
                    .collect();
                let inside = matched
                    .iter()
                    .filter(|(r, t)| *t >= r.lower_bound && *t <= r.upper_bound)
                    .count();
                (Some(mean(&errors)), Some(inside as f64 / matched.len() as f64))
            };

            LabelSummary {
                label: label.to_string(),
                n_rows: group.len(),
                n_matched: matched.len(),
                mae,
                coverage,
                mean_interval_width: mean(&widths),
            }
        })
        .collect()
}
