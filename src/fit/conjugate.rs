//! Built-in conjugate Gaussian backend.
//!
//! Implements [`FitBackend`] with a Gaussian linear (mixed) model:
//!
//! - priors enter as ridge-style pseudo-observation rows, so the posterior
//!   mean is one augmented least-squares solve
//! - per-individual random effects are shrinkage coefficients whose prior
//!   sd is the population sd of the individual deviations
//! - posterior draws come from the analytic Normal–inverse-chi-square
//!   conditional, one independent stream per chain (chains in parallel,
//!   each with a derived deterministic seed)
//!
//! Everything is reproducible given the sampler/prediction seeds; there is
//! no hidden global random state.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Gamma, Normal};
use rayon::prelude::*;

use crate::domain::{
    CtTable, FitDiagnostics, FitSpec, NewIndividualSampling, PredictOptions, PredictionRow,
    PredictionSet, PriorConfig, QueryPoint, SamplerConfig,
};
use crate::error::AppError;
use crate::fit::backend::{ChainDraws, FitBackend, FittedModel};
use crate::fit::design::{fill_design_row, CoefficientLayout, N_FIXED};
use crate::fit::diagnostics;
use crate::math::{mean, quantile_sorted, solve_least_squares, spd_inverse};

/// Credible-interval bounds reported by `predict`.
const QUANTILE_LO: f64 = 0.025;
const QUANTILE_HI: f64 = 0.975;

/// Mixing constant for deriving per-chain and per-individual seeds.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Salt separating the predictive-noise stream from effect draws.
const NOISE_SALT: u64 = 0x517C_C1B7_2722_0A95;

/// The default fitting backend.
pub struct ConjugateBackend;

impl FitBackend for ConjugateBackend {
    type Model = FittedModel;

    fn fit(
        &self,
        table: &CtTable,
        spec: &FitSpec,
        sampler: &SamplerConfig,
    ) -> Result<FittedModel, AppError> {
        fit_conjugate(table, spec, sampler)
    }

    fn predict(
        &self,
        model: &FittedModel,
        query: &[QueryPoint],
        opts: &PredictOptions,
    ) -> Result<PredictionSet, AppError> {
        predict_conjugate(model, query, opts)
    }

    fn diagnostics(model: &FittedModel) -> &FitDiagnostics {
        &model.diagnostics
    }
}

fn validate_sampler(sampler: &SamplerConfig) -> Result<(), AppError> {
    if sampler.chains < 2 {
        return Err(AppError::new(2, "Sampler chains must be >= 2 (split diagnostics need them)."));
    }
    if sampler.draws_per_chain < 4 {
        return Err(AppError::new(2, "Sampler draws per chain must be >= 4."));
    }
    if !(sampler.target_accept.is_finite() && sampler.target_accept > 0.0 && sampler.target_accept < 1.0) {
        return Err(AppError::new(2, "Sampler target_accept must lie in (0, 1)."));
    }
    Ok(())
}

fn fit_conjugate(
    table: &CtTable,
    spec: &FitSpec,
    sampler: &SamplerConfig,
) -> Result<FittedModel, AppError> {
    validate_sampler(sampler)?;
    let priors = spec.priors.resolve();
    if !priors.is_valid() {
        return Err(AppError::new(2, "Prior configuration is invalid (sds must be finite and > 0)."));
    }
    if table.is_empty() {
        return Err(AppError::new(3, "No observations to fit."));
    }
    let n = table.len();
    if n <= N_FIXED {
        return Err(AppError::new(
            3,
            format!("Underdetermined fit: n={n} observations for {N_FIXED} fixed effects."),
        ));
    }

    let layout = CoefficientLayout::from_table(table, spec.random_effects);
    let p = layout.n_coefficients();

    // Augmented system: data rows on top, one prior pseudo-observation row
    // per coefficient below. A coefficient with prior N(m, s) contributes the
    // row e_j / s with target m / s.
    let mut a = DMatrix::<f64>::zeros(n + p, p);
    let mut b = DVector::<f64>::zeros(n + p);
    let mut row = vec![0.0; p];

    for (i, obs) in table.rows.iter().enumerate() {
        let idx = layout.index_of(obs.individual_id);
        fill_design_row(&layout, idx, f64::from(obs.time), &mut row);
        for j in 0..p {
            a[(i, j)] = row[j];
        }
        b[i] = obs.observed_ct;
    }
    for j in 0..p {
        let (prior_mean, prior_sd) = coefficient_prior(&layout, &priors, j);
        a[(n + j, j)] = 1.0 / prior_sd;
        b[n + j] = prior_mean / prior_sd;
    }

    let beta_hat = solve_least_squares(&a, &b)
        .ok_or_else(|| AppError::new(4, "Posterior mean solve failed (singular design)."))?;

    // Residual variance from the data rows only.
    let mut sse = 0.0;
    for (i, obs) in table.rows.iter().enumerate() {
        let fitted: f64 = (0..p).map(|j| a[(i, j)] * beta_hat[j]).sum();
        let r = obs.observed_ct - fitted;
        sse += r * r;
    }
    if !sse.is_finite() {
        return Err(AppError::new(4, "Non-finite residual sum of squares."));
    }
    let df = (n - N_FIXED) as f64;
    let sigma2_hat = sse / df;
    let sigma_hat = sigma2_hat.sqrt();

    // Unit posterior covariance (scaled by each draw's sigma²).
    let cov_unit = spd_inverse(a.transpose() * &a)
        .ok_or_else(|| AppError::new(4, "Posterior covariance is not positive definite."))?;
    let cov_l = nalgebra::Cholesky::new(cov_unit)
        .ok_or_else(|| AppError::new(4, "Posterior covariance factorization failed."))?
        .l();

    let chains: Vec<Result<ChainDraws, AppError>> = (0..sampler.chains)
        .into_par_iter()
        .map(|c| {
            let seed = sampler.seed.wrapping_add(SEED_MIX.wrapping_mul(c as u64 + 1));
            draw_chain(seed, sampler.draws_per_chain, &beta_hat, &cov_l, sigma2_hat, df)
        })
        .collect();
    let chains = chains.into_iter().collect::<Result<Vec<_>, _>>()?;

    let beta0: Vec<Vec<f64>> = chains.iter().map(|c| c.beta.iter().map(|d| d[0]).collect()).collect();
    let beta1: Vec<Vec<f64>> = chains.iter().map(|c| c.beta.iter().map(|d| d[1]).collect()).collect();
    let sigma: Vec<Vec<f64>> = chains.iter().map(|c| c.sigma.clone()).collect();
    let diag =
        diagnostics::summarize(&[beta0.as_slice(), beta1.as_slice(), sigma.as_slice()], sampler)?;

    Ok(FittedModel {
        spec: *spec,
        layout,
        beta_hat,
        sigma_hat,
        chains,
        diagnostics: diag,
        n_obs: n,
    })
}

/// Prior `(mean, sd)` for coefficient column `j`.
fn coefficient_prior(layout: &CoefficientLayout, priors: &PriorConfig, j: usize) -> (f64, f64) {
    if j == 0 {
        (priors.intercept.mean, priors.intercept.sd)
    } else if j == 1 {
        (priors.slope.mean, priors.slope.sd)
    } else if layout.has_random_slope() && j >= N_FIXED + layout.n_individuals() {
        (0.0, priors.indiv_slope_sd)
    } else {
        (0.0, priors.indiv_intercept_sd)
    }
}

fn draw_chain(
    seed: u64,
    draws: usize,
    beta_hat: &DVector<f64>,
    cov_l: &DMatrix<f64>,
    sigma2_hat: f64,
    df: f64,
) -> Result<ChainDraws, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let std_normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Draw distribution error: {e}")))?;
    // Gamma(df/2, scale 2) is chi-square with df degrees of freedom.
    let chi2 = Gamma::new(df / 2.0, 2.0)
        .map_err(|e| AppError::new(4, format!("Draw distribution error: {e}")))?;

    let p = beta_hat.len();
    let mut beta = Vec::with_capacity(draws);
    let mut sigma = Vec::with_capacity(draws);

    for _ in 0..draws {
        let sigma2_d = df * sigma2_hat / chi2.sample(&mut rng).max(1e-12);
        let z = DVector::from_fn(p, |_, _| std_normal.sample(&mut rng));
        let beta_d = beta_hat + (cov_l * z) * sigma2_d.sqrt();
        if beta_d.iter().any(|v| !v.is_finite()) {
            return Err(AppError::new(4, "Non-finite posterior draw."));
        }
        beta.push(beta_d);
        sigma.push(sigma2_d.sqrt());
    }

    Ok(ChainDraws { beta, sigma })
}

fn predict_conjugate(
    model: &FittedModel,
    query: &[QueryPoint],
    opts: &PredictOptions,
) -> Result<PredictionSet, AppError> {
    let mut unseen: Vec<u32> = query
        .iter()
        .filter(|q| model.layout.index_of(q.individual_id).is_none())
        .map(|q| q.individual_id)
        .collect();
    unseen.sort_unstable();
    unseen.dedup();

    if !unseen.is_empty() {
        if !opts.allow_new_individuals {
            return Err(AppError::new(
                2,
                format!(
                    "Query references {} individual id(s) absent from training (first: {}); \
                     set allow_new_individuals to permit this.",
                    unseen.len(),
                    unseen[0]
                ),
            ));
        }
        if opts.new_individual_sampling == NewIndividualSampling::None {
            return Err(AppError::new(
                2,
                "new_individual_sampling=none cannot produce predictions for unseen individual ids.",
            ));
        }
    }

    // Flatten chains into one draw list; order is fixed, so derived effect
    // vectors stay aligned with it.
    let draws: Vec<(&DVector<f64>, f64)> = model
        .chains
        .iter()
        .flat_map(|c| c.beta.iter().zip(c.sigma.iter().copied()))
        .collect();
    let n_draws = draws.len();
    if n_draws == 0 {
        return Err(AppError::new(4, "Fitted model carries no posterior draws."));
    }

    // One effect realization per unseen individual per draw, shared across
    // all of that individual's query rows.
    let priors = model.spec.priors.resolve();
    let mut new_effects: HashMap<u32, Vec<(f64, f64)>> = HashMap::new();
    if opts.new_individual_sampling == NewIndividualSampling::PopulationGaussianDraw {
        for &id in &unseen {
            let mut rng =
                StdRng::seed_from_u64(opts.seed ^ SEED_MIX.wrapping_mul(u64::from(id) + 1));
            let effects = draw_population_effects(&mut rng, model, &priors, n_draws)?;
            new_effects.insert(id, effects);
        }
    }

    let mut noise_rng = StdRng::seed_from_u64(opts.seed.wrapping_add(NOISE_SALT));
    let std_normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Draw distribution error: {e}")))?;

    let layout = &model.layout;
    let mut rows = Vec::with_capacity(query.len());
    let mut mu = vec![0.0; n_draws];
    let mut predictive = vec![0.0; n_draws];

    for q in query {
        let t = f64::from(q.time);
        let idx = layout.index_of(q.individual_id);
        let effects = new_effects.get(&q.individual_id);

        for (d, (beta, sigma)) in draws.iter().enumerate() {
            let mut value = beta[0] + beta[1] * t;
            if let Some(idx) = idx {
                if layout.has_random_intercept() {
                    value += beta[layout.intercept_column(idx)];
                }
                if layout.has_random_slope() {
                    value += beta[layout.slope_column(idx)] * t;
                }
            } else if let Some(effects) = effects {
                let (b0, b1) = effects[d];
                value += b0 + b1 * t;
            }
            mu[d] = value;
            predictive[d] = value + sigma * std_normal.sample(&mut noise_rng);
        }

        let point = mean(&mu);
        if !point.is_finite() {
            return Err(AppError::new(4, "Non-finite prediction."));
        }
        predictive.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        rows.push(PredictionRow {
            individual_id: q.individual_id,
            time: q.time,
            point,
            lower: quantile_sorted(&predictive, QUANTILE_LO),
            upper: quantile_sorted(&predictive, QUANTILE_HI),
        });
    }

    Ok(PredictionSet { rows })
}

/// Per-draw `(intercept, slope)` deviations for one new individual, drawn
/// from the population distribution the model was fitted under. Effects the
/// model does not carry stay zero.
fn draw_population_effects(
    rng: &mut StdRng,
    model: &FittedModel,
    priors: &PriorConfig,
    n_draws: usize,
) -> Result<Vec<(f64, f64)>, AppError> {
    let b0_dist = Normal::new(0.0, priors.indiv_intercept_sd)
        .map_err(|e| AppError::new(4, format!("Draw distribution error: {e}")))?;
    let b1_dist = Normal::new(0.0, priors.indiv_slope_sd)
        .map_err(|e| AppError::new(4, format!("Draw distribution error: {e}")))?;

    let mut out = Vec::with_capacity(n_draws);
    for _ in 0..n_draws {
        let b0 = if model.layout.has_random_intercept() { b0_dist.sample(rng) } else { 0.0 };
        let b1 = if model.layout.has_random_slope() { b1_dist.sample(rng) } else { 0.0 };
        out.push((b0, b1));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{generate, to_table};
    use crate::domain::{CtRow, PopulationParams, PriorSpec, RandomEffectsSpec, SimConfig};

    fn exact_line_table() -> CtTable {
        // ct = 20 + 1.5 t for three individuals, no noise.
        let mut rows = Vec::new();
        for id in 1..=3u32 {
            for t in 0..=10u32 {
                rows.push(CtRow {
                    individual_id: id,
                    time: t,
                    observed_ct: 20.0 + 1.5 * f64::from(t),
                });
            }
        }
        CtTable { rows }
    }

    fn pooled_spec() -> FitSpec {
        FitSpec {
            random_effects: RandomEffectsSpec::None,
            priors: PriorSpec::Default,
        }
    }

    fn test_sampler() -> SamplerConfig {
        SamplerConfig {
            chains: 4,
            draws_per_chain: 400,
            target_accept: 0.95,
            seed: 9,
        }
    }

    fn simulated_table(seed: u64) -> CtTable {
        let config = SimConfig {
            n_individuals: 8,
            max_time: 12,
            population: PopulationParams {
                peak_mean: 17.8,
                peak_sd: 2.2,
                slope_mean: 1.7,
                slope_sd: 0.425,
            },
            noise_sd: 3.0,
            detection_limit: 40.0,
            seed,
            first_id: 1,
        };
        to_table(&generate(&config).unwrap())
    }

    #[test]
    fn pooled_fit_recovers_known_line() {
        let backend = ConjugateBackend;
        let model = backend.fit(&exact_line_table(), &pooled_spec(), &test_sampler()).unwrap();

        assert!((model.beta_hat[0] - 20.0).abs() < 1e-3);
        assert!((model.beta_hat[1] - 1.5).abs() < 1e-3);
        assert!(model.sigma_hat < 1e-6);
    }

    #[test]
    fn prediction_on_noise_free_fit_matches_truth() {
        let backend = ConjugateBackend;
        let model = backend.fit(&exact_line_table(), &pooled_spec(), &test_sampler()).unwrap();

        let set = backend
            .predict(
                &model,
                &[QueryPoint { individual_id: 1, time: 4 }],
                &PredictOptions::default(),
            )
            .unwrap();
        assert_eq!(set.rows.len(), 1);
        assert!((set.rows[0].point - 26.0).abs() < 1e-2);
        // Zero residual variance collapses the predictive interval.
        assert!(set.rows[0].upper - set.rows[0].lower < 1e-2);
    }

    #[test]
    fn hierarchical_fit_is_reliable_on_simulated_data() {
        let backend = ConjugateBackend;
        let spec = FitSpec {
            random_effects: RandomEffectsSpec::InterceptAndSlope,
            priors: PriorSpec::Default,
        };
        let model = backend.fit(&simulated_table(21), &spec, &test_sampler()).unwrap();
        assert!(model.diagnostics.is_reliable(), "diagnostics: {:?}", model.diagnostics);
        assert_eq!(model.n_draws(), 1_600);
    }

    #[test]
    fn new_individual_interval_is_at_least_as_wide() {
        let backend = ConjugateBackend;
        let spec = FitSpec {
            random_effects: RandomEffectsSpec::InterceptAndSlope,
            priors: PriorSpec::Default,
        };
        let model = backend.fit(&simulated_table(22), &spec, &test_sampler()).unwrap();

        let opts = PredictOptions {
            allow_new_individuals: true,
            new_individual_sampling: NewIndividualSampling::PopulationGaussianDraw,
            seed: 5,
        };
        let set = backend
            .predict(
                &model,
                &[
                    QueryPoint { individual_id: 1, time: 6 },
                    QueryPoint { individual_id: 999, time: 6 },
                ],
                &opts,
            )
            .unwrap();

        let trained = set.rows[0].upper - set.rows[0].lower;
        let fresh = set.rows[1].upper - set.rows[1].lower;
        assert!(fresh >= trained, "fresh={fresh} trained={trained}");
    }

    #[test]
    fn population_average_is_narrower_than_gaussian_draw() {
        let backend = ConjugateBackend;
        let spec = FitSpec {
            random_effects: RandomEffectsSpec::InterceptAndSlope,
            priors: PriorSpec::Default,
        };
        let model = backend.fit(&simulated_table(23), &spec, &test_sampler()).unwrap();
        let query = [QueryPoint { individual_id: 777, time: 8 }];

        let avg = backend
            .predict(
                &model,
                &query,
                &PredictOptions {
                    allow_new_individuals: true,
                    new_individual_sampling: NewIndividualSampling::PopulationAverage,
                    seed: 5,
                },
            )
            .unwrap();
        let drawn = backend
            .predict(
                &model,
                &query,
                &PredictOptions {
                    allow_new_individuals: true,
                    new_individual_sampling: NewIndividualSampling::PopulationGaussianDraw,
                    seed: 5,
                },
            )
            .unwrap();

        let width_avg = avg.rows[0].upper - avg.rows[0].lower;
        let width_drawn = drawn.rows[0].upper - drawn.rows[0].lower;
        assert!(width_drawn > width_avg, "drawn={width_drawn} avg={width_avg}");
    }

    #[test]
    fn unseen_ids_are_rejected_without_permission() {
        let backend = ConjugateBackend;
        let model = backend.fit(&exact_line_table(), &pooled_spec(), &test_sampler()).unwrap();
        let query = [QueryPoint { individual_id: 42, time: 1 }];

        let err = backend.predict(&model, &query, &PredictOptions::default()).unwrap_err();
        assert!(err.is_invalid_parameter());

        let err = backend
            .predict(
                &model,
                &query,
                &PredictOptions {
                    allow_new_individuals: true,
                    new_individual_sampling: NewIndividualSampling::None,
                    seed: 0,
                },
            )
            .unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn prediction_is_reproducible_for_fixed_seed() {
        let backend = ConjugateBackend;
        let spec = FitSpec {
            random_effects: RandomEffectsSpec::InterceptOnly,
            priors: PriorSpec::Default,
        };
        let model = backend.fit(&simulated_table(24), &spec, &test_sampler()).unwrap();
        let opts = PredictOptions {
            allow_new_individuals: true,
            new_individual_sampling: NewIndividualSampling::PopulationGaussianDraw,
            seed: 31,
        };
        let query = [
            QueryPoint { individual_id: 2, time: 3 },
            QueryPoint { individual_id: 500, time: 3 },
        ];

        let a = backend.predict(&model, &query, &opts).unwrap();
        let b = backend.predict(&model, &query, &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_sampler_and_empty_table_are_rejected() {
        let backend = ConjugateBackend;

        let mut sampler = test_sampler();
        sampler.chains = 1;
        let err = backend.fit(&exact_line_table(), &pooled_spec(), &sampler).unwrap_err();
        assert!(err.is_invalid_parameter());

        let mut sampler = test_sampler();
        sampler.target_accept = 1.5;
        let err = backend.fit(&exact_line_table(), &pooled_spec(), &sampler).unwrap_err();
        assert!(err.is_invalid_parameter());

        let err = backend
            .fit(&CtTable::default(), &pooled_spec(), &test_sampler())
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
