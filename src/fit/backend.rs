//! The fitting-backend seam.
//!
//! The pipeline never touches sampler internals: it hands a table, a
//! regression spec, and a sampler config to a [`FitBackend`] and gets back
//! an opaque model plus a diagnostics report. Any Bayesian regression
//! engine satisfying this contract can sit behind the seam; this crate
//! ships [`crate::fit::ConjugateBackend`].

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::domain::{
    CtTable, FitDiagnostics, FitSpec, PredictOptions, PredictionSet, QueryPoint, SamplerConfig,
};
use crate::error::AppError;
use crate::fit::design::CoefficientLayout;
use crate::math::{mean, quantile_sorted, sample_variance};

/// A Bayesian regression backend.
///
/// `fit` must surface convergence problems through the model's diagnostics
/// report, not as errors; errors are reserved for invalid inputs and
/// numerical failure.
pub trait FitBackend {
    type Model;

    fn fit(
        &self,
        table: &CtTable,
        spec: &FitSpec,
        sampler: &SamplerConfig,
    ) -> Result<Self::Model, AppError>;

    fn predict(
        &self,
        model: &Self::Model,
        query: &[QueryPoint],
        opts: &PredictOptions,
    ) -> Result<PredictionSet, AppError>;

    fn diagnostics(model: &Self::Model) -> &FitDiagnostics;
}

/// Posterior draws from one chain.
#[derive(Debug, Clone)]
pub struct ChainDraws {
    /// One coefficient vector per draw.
    pub beta: Vec<DVector<f64>>,
    /// Residual sd per draw, aligned with `beta`.
    pub sigma: Vec<f64>,
}

/// A fitted conjugate model: posterior mean, draws, and diagnostics.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub spec: FitSpec,
    pub layout: CoefficientLayout,
    pub beta_hat: DVector<f64>,
    pub sigma_hat: f64,
    pub chains: Vec<ChainDraws>,
    pub diagnostics: FitDiagnostics,
    pub n_obs: usize,
}

impl FittedModel {
    /// Total posterior draw count across chains.
    pub fn n_draws(&self) -> usize {
        self.chains.iter().map(|c| c.beta.len()).sum()
    }
}

/// Posterior summary of one coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub q025: f64,
    pub q975: f64,
}

/// Portable summary of a fit (the JSON export schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub label: String,
    pub random_effects: String,
    pub n_obs: usize,
    pub n_individuals: usize,
    /// Fixed effects only; individual deviations stay in the model object.
    pub coefficients: Vec<CoefficientSummary>,
    pub sigma_mean: f64,
    pub diagnostics: FitDiagnostics,
    pub reliable: bool,
}

impl FitSummary {
    pub fn from_model(label: impl Into<String>, model: &FittedModel) -> Self {
        let names = model.layout.names();
        let coefficients = (0..crate::fit::design::N_FIXED)
            .map(|j| {
                let mut draws: Vec<f64> = model
                    .chains
                    .iter()
                    .flat_map(|c| c.beta.iter().map(move |b| b[j]))
                    .collect();
                draws.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                CoefficientSummary {
                    name: names[j].clone(),
                    mean: mean(&draws),
                    sd: sample_variance(&draws).sqrt(),
                    q025: quantile_sorted(&draws, 0.025),
                    q975: quantile_sorted(&draws, 0.975),
                }
            })
            .collect();

        let sigma_draws: Vec<f64> = model.chains.iter().flat_map(|c| c.sigma.iter().copied()).collect();

        Self {
            label: label.into(),
            random_effects: model.spec.random_effects.display_name().to_string(),
            n_obs: model.n_obs,
            n_individuals: model.layout.n_individuals(),
            coefficients,
            sigma_mean: mean(&sigma_draws),
            diagnostics: model.diagnostics,
            reliable: model.diagnostics.is_reliable(),
        }
    }
}
