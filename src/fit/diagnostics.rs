//! Convergence diagnostics computed from posterior draw chains.
//!
//! A backend attaches a [`FitDiagnostics`] report to every fitted model so
//! callers can flag unreliable fits without the fit call failing. Monitored
//! parameters here are the fixed effects and the residual sd; the report
//! keeps the worst value across them.

use crate::domain::{FitDiagnostics, SamplerConfig};
use crate::error::AppError;
use crate::math::{mean, quantile_sorted, sample_variance};

/// Lag-`k` autocorrelation of a scalar series.
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if series.is_empty() || lag >= series.len() {
        return 0.0;
    }

    let m = mean(series);
    let mut denominator = 0.0;
    for value in series {
        let centered = value - m;
        denominator += centered * centered;
    }
    if denominator <= 0.0 {
        return 0.0;
    }

    let mut numerator = 0.0;
    for idx in 0..series.len() - lag {
        numerator += (series[idx] - m) * (series[idx + lag] - m);
    }
    numerator / denominator
}

/// Effective sample size of one chain, truncating the autocorrelation sum at
/// the first non-positive lag.
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return n as f64;
    }

    let mut rho_sum = 0.0;
    for lag in 1..n {
        let rho = autocorrelation(series, lag);
        if rho <= 0.0 {
            break;
        }
        rho_sum += rho;
    }

    n as f64 / (1.0 + 2.0 * rho_sum).max(1.0)
}

/// Tail effective sample size: the smaller ESS of the two extreme-quantile
/// indicator series (below the 5th / above the 95th percentile).
pub fn tail_effective_sample_size(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return series.len() as f64;
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q05 = quantile_sorted(&sorted, 0.05);
    let q95 = quantile_sorted(&sorted, 0.95);

    let lower: Vec<f64> = series.iter().map(|&v| f64::from(u8::from(v <= q05))).collect();
    let upper: Vec<f64> = series.iter().map(|&v| f64::from(u8::from(v >= q95))).collect();
    effective_sample_size(&lower).min(effective_sample_size(&upper))
}

/// Split scale-reduction statistic across chains for one parameter.
///
/// Each chain is split in half; R-hat compares between- and within-half-chain
/// variance. Requires at least two chains with at least four draws each.
pub fn split_rhat(chains: &[Vec<f64>]) -> Result<f64, AppError> {
    if chains.len() < 2 {
        return Err(AppError::new(4, "Split R-hat requires at least two chains."));
    }
    let min_len = chains.iter().map(Vec::len).min().unwrap_or(0);
    let half = min_len / 2;
    if half < 2 {
        return Err(AppError::new(4, "Split R-hat requires at least four draws per chain."));
    }

    let mut halves: Vec<&[f64]> = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        halves.push(&chain[..half]);
        halves.push(&chain[half..2 * half]);
    }

    let n = half as f64;
    let means: Vec<f64> = halves.iter().map(|h| mean(h)).collect();
    let within = mean(&halves.iter().map(|h| sample_variance(h)).collect::<Vec<f64>>());
    let between = n * sample_variance(&means);

    // Constant chains carry no information to disagree about.
    if within < 1e-300 {
        return Ok(1.0);
    }

    let var_plus = (n - 1.0) / n * within + between / n;
    Ok((var_plus / within).sqrt())
}

/// Per-parameter chains, outer index = chain.
pub type ParameterChains<'a> = &'a [Vec<f64>];

/// Build the report from the monitored parameters' chains.
///
/// ESS values are summed across chains per parameter; the report keeps the
/// worst (max R-hat, min ESS) over parameters.
pub fn summarize(parameters: &[ParameterChains<'_>], sampler: &SamplerConfig) -> Result<FitDiagnostics, AppError> {
    let mut max_rhat = f64::NEG_INFINITY;
    let mut min_ess_bulk = f64::INFINITY;
    let mut min_ess_tail = f64::INFINITY;

    for chains in parameters {
        max_rhat = max_rhat.max(split_rhat(chains)?);

        let bulk: f64 = chains.iter().map(|c| effective_sample_size(c)).sum();
        let tail: f64 = chains.iter().map(|c| tail_effective_sample_size(c)).sum();
        min_ess_bulk = min_ess_bulk.min(bulk);
        min_ess_tail = min_ess_tail.min(tail);
    }

    if !max_rhat.is_finite() {
        return Err(AppError::new(4, "No parameters available for diagnostics."));
    }

    Ok(FitDiagnostics {
        max_rhat,
        min_ess_bulk,
        min_ess_tail,
        n_chains: sampler.chains,
        n_draws: sampler.chains * sampler.draws_per_chain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autocorrelation_is_one_at_lag_zero() {
        let series = [1.0, 3.0, 2.0, 5.0, 4.0];
        assert!((autocorrelation(&series, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ess_of_alternating_series_is_high() {
        // Strong negative lag-1 correlation truncates the sum immediately.
        let series: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(effective_sample_size(&series) >= 99.0);
    }

    #[test]
    fn ess_of_trending_series_is_low() {
        let series: Vec<f64> = (0..100).map(f64::from).collect();
        assert!(effective_sample_size(&series) < 10.0);
    }

    #[test]
    fn split_rhat_near_one_for_well_mixed_chains() {
        // Two deterministic chains drawing from the same oscillation.
        let a: Vec<f64> = (0..200).map(|i| f64::from(i % 7)).collect();
        let b: Vec<f64> = (0..200).map(|i| f64::from((i + 3) % 7)).collect();
        let rhat = split_rhat(&[a, b]).unwrap();
        assert!(rhat < 1.05, "rhat={rhat}");
    }

    #[test]
    fn split_rhat_detects_disagreeing_chains() {
        let a: Vec<f64> = (0..100).map(|i| f64::from(i % 5)).collect();
        let b: Vec<f64> = (0..100).map(|i| 50.0 + f64::from(i % 5)).collect();
        let rhat = split_rhat(&[a, b]).unwrap();
        assert!(rhat > 2.0, "rhat={rhat}");
    }

    #[test]
    fn split_rhat_requires_two_chains() {
        let a: Vec<f64> = (0..100).map(f64::from).collect();
        assert!(split_rhat(&[a]).is_err());
    }

    #[test]
    fn constant_chains_report_rhat_one() {
        let a = vec![2.0; 50];
        let b = vec![2.0; 50];
        assert!((split_rhat(&[a, b]).unwrap() - 1.0).abs() < 1e-12);
    }
}
