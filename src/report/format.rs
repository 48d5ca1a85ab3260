//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - simulation/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::compare::LabelSummary;
use crate::domain::{ComparisonRow, Dataset, SimConfig};
use crate::fit::FitSummary;

/// Format the dataset summary (config + per-individual lines).
pub fn format_dataset_summary(dataset: &Dataset, config: &SimConfig) -> String {
    let mut out = String::new();

    out.push_str("=== ctk - simulated Ct trajectories ===\n");
    out.push_str(&format!(
        "Individuals: n={} | follow-up t=[0, {}]\n",
        config.n_individuals, config.max_time
    ));
    out.push_str(&format!(
        "Population: peak ~ N({}, {}) | slope ~ N({}, {}) | noise sd={}\n",
        config.population.peak_mean,
        config.population.peak_sd,
        config.population.slope_mean,
        config.population.slope_sd,
        config.noise_sd
    ));
    out.push_str(&format!(
        "Detection limit: Ct {} | censored: {}/{} | observations: {}\n",
        config.detection_limit,
        dataset.n_censored(),
        dataset.n_individuals(),
        dataset.n_observations()
    ));

    out.push_str(&format!(
        "\n{:>6} {:>8} {:>8} {:>6} {:>9}\n",
        "id", "peak", "slope", "n_obs", "censored"
    ));
    for trajectory in &dataset.trajectories {
        out.push_str(&format!(
            "{:>6} {:>8.3} {:>8.3} {:>6} {:>9}\n",
            trajectory.individual.id,
            trajectory.individual.peak,
            trajectory.individual.slope,
            trajectory.observations.len(),
            if trajectory.censored { "yes" } else { "no" }
        ));
    }

    out
}

/// Format one fit's coefficient and diagnostics summary.
pub fn format_fit_summary(summary: &FitSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} ({}) | n_obs={} individuals={}\n",
        summary.label, summary.random_effects, summary.n_obs, summary.n_individuals
    ));
    out.push_str(&format!(
        "{:<12} {:>10} {:>10} {:>10} {:>10}\n",
        "coef", "mean", "sd", "q2.5", "q97.5"
    ));
    for coef in &summary.coefficients {
        out.push_str(&format!(
            "{:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4}\n",
            coef.name, coef.mean, coef.sd, coef.q025, coef.q975
        ));
    }
    out.push_str(&format!("sigma (residual sd): {:.4}\n", summary.sigma_mean));

    let d = &summary.diagnostics;
    let marker = if summary.reliable { "ok" } else { "UNRELIABLE" };
    out.push_str(&format!(
        "diagnostics: rhat_max={:.4} ess_bulk={:.0} ess_tail={:.0} chains={} draws={} [{marker}]\n",
        d.max_rhat, d.min_ess_bulk, d.min_ess_tail, d.n_chains, d.n_draws
    ));

    out
}

/// Format the per-label comparison summary table.
///
/// `flags` maps a label to an annotation (e.g. a diagnostics warning), shown
/// after the label.
pub fn format_comparison_summary(
    summaries: &[LabelSummary],
    flags: &[(String, String)],
    failed: &[(String, String)],
) -> String {
    let mut out = String::new();

    out.push_str("Model comparison (held-out individuals):\n");
    out.push_str(&format!(
        "{:<28} {:>6} {:>8} {:>8} {:>10} {:>8}\n",
        "model", "rows", "matched", "mae", "coverage", "width"
    ));
    for s in summaries {
        let flagged = flags.iter().any(|(label, _)| *label == s.label);
        let marker = if flagged { "!" } else { " " };
        out.push_str(&format!(
            "{marker}{:<27} {:>6} {:>8} {:>8} {:>10} {:>8.2}\n",
            s.label,
            s.n_rows,
            s.n_matched,
            s.mae.map_or("-".to_string(), |v| format!("{v:.2}")),
            s.coverage.map_or("-".to_string(), |v| format!("{:.1}%", v * 100.0)),
            s.mean_interval_width
        ));
    }

    for (label, note) in flags {
        out.push_str(&format!("  (! {label}) {note}\n"));
    }
    for (label, reason) in failed {
        out.push_str(&format!("  (failed {label}) {reason}\n"));
    }

    out
}

/// Format the first `limit` aligned comparison rows.
pub fn format_comparison_head(rows: &[ComparisonRow], limit: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<28} {:>4} {:>5} {:>9} {:>9} {:>9} {:>9}\n",
        "label", "id", "t", "point", "lower", "upper", "truth"
    ));
    for row in rows.iter().take(limit) {
        out.push_str(&format!(
            "{:<28} {:>4} {:>5} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            row.label,
            row.individual_id,
            row.time,
            row.point_estimate,
            row.lower_bound,
            row.upper_bound,
            row.ground_truth.map_or("-".to_string(), |v| format!("{v:.2}")),
        ));
    }
    if rows.len() > limit {
        out.push_str(&format!("... {} more rows\n", rows.len() - limit));
    }

    out
}
