//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during simulation and fitting
//! - exported to JSON/CSV
//! - reloaded later for comparisons

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Detection limit used when none is configured: Ct 40, the conventional
/// "undetectable" cycle-threshold cutoff.
pub const DEFAULT_DETECTION_LIMIT: f64 = 40.0;

/// Minimum per-individual decay rate. Raw population draws below this are
/// clamped so every simulated trajectory eventually crosses the detection
/// limit instead of staying flat or declining in Ct.
pub const SLOPE_FLOOR: f64 = 0.01;

/// Population distributions the per-individual latent parameters are drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PopulationParams {
    /// Mean of the Normal distribution for the peak (time-0) Ct value.
    pub peak_mean: f64,
    pub peak_sd: f64,
    /// Mean of the Normal distribution for the per-day Ct increase.
    pub slope_mean: f64,
    pub slope_sd: f64,
}

/// One simulation run's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub n_individuals: usize,
    /// Inclusive upper bound on the time index; follow-up covers `0..=max_time`.
    pub max_time: u32,
    pub population: PopulationParams,
    /// Standard deviation of the additive Gaussian measurement noise.
    pub noise_sd: f64,
    /// Observations above this Ct value end the trajectory (the crossing
    /// observation itself is retained).
    pub detection_limit: f64,
    /// Explicit seed; the same seed and config reproduce the dataset exactly.
    pub seed: u64,
    /// Id assigned to the first individual. Lets callers generate disjoint
    /// cohorts (e.g. a training set and an evaluation set) without clashes.
    pub first_id: u32,
}

/// One simulated individual with their latent trajectory parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: u32,
    /// Latent time-0 Ct value.
    pub peak: f64,
    /// Latent per-day Ct increase, never below [`SLOPE_FLOOR`].
    pub slope: f64,
}

/// A single (possibly noisy) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: u32,
    /// Noise-free value `peak + slope * time`.
    pub true_ct: f64,
    pub observed_ct: f64,
}

/// The retained time series for one individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub individual: Individual,
    /// Time-ascending; ends either at `max_time` or at the first observation
    /// whose observed value exceeded the detection limit.
    pub observations: Vec<Observation>,
    /// Whether the series was cut short by a detection-limit crossing.
    pub censored: bool,
}

/// All trajectories from one `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub trajectories: Vec<Trajectory>,
}

impl Dataset {
    pub fn n_individuals(&self) -> usize {
        self.trajectories.len()
    }

    pub fn n_observations(&self) -> usize {
        self.trajectories.iter().map(|t| t.observations.len()).sum()
    }

    pub fn n_censored(&self) -> usize {
        self.trajectories.iter().filter(|t| t.censored).count()
    }
}

/// One flattened observation row, the unit consumed by fitting backends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CtRow {
    pub individual_id: u32,
    pub time: u32,
    pub observed_ct: f64,
}

/// The flattened dataset: individual-major, time-ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CtTable {
    pub rows: Vec<CtRow>,
}

impl CtTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Distinct individual ids in first-appearance order.
    pub fn individual_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for row in &self.rows {
            if ids.last() != Some(&row.individual_id) && !ids.contains(&row.individual_id) {
                ids.push(row.individual_id);
            }
        }
        ids
    }

    /// Reconstruct per-individual `(time, observed_ct)` series, preserving
    /// row order within each individual.
    pub fn group_by_individual(&self) -> Vec<(u32, Vec<(u32, f64)>)> {
        let mut out: Vec<(u32, Vec<(u32, f64)>)> = Vec::new();
        for row in &self.rows {
            match out.iter_mut().find(|(id, _)| *id == row.individual_id) {
                Some((_, series)) => series.push((row.time, row.observed_ct)),
                None => out.push((row.individual_id, vec![(row.time, row.observed_ct)])),
            }
        }
        out
    }
}

/// Which per-individual random effects the regression carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RandomEffectsSpec {
    /// Complete pooling: one shared intercept and slope.
    None,
    /// Per-individual intercept deviations.
    InterceptOnly,
    /// Per-individual intercept and slope deviations.
    InterceptAndSlope,
}

impl RandomEffectsSpec {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            RandomEffectsSpec::None => "pooled",
            RandomEffectsSpec::InterceptOnly => "random intercept",
            RandomEffectsSpec::InterceptAndSlope => "random intercept+slope",
        }
    }
}

/// A univariate Normal prior on one fixed-effect coefficient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalPrior {
    pub mean: f64,
    pub sd: f64,
}

/// Prior hyperparameters for the regression.
///
/// The per-individual sds double as the population distribution that
/// new-individual predictions draw from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorConfig {
    pub intercept: NormalPrior,
    pub slope: NormalPrior,
    /// Population sd of per-individual intercept deviations.
    pub indiv_intercept_sd: f64,
    /// Population sd of per-individual slope deviations.
    pub indiv_slope_sd: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        // Near-flat fixed-effect priors; moderate shrinkage scales for the
        // individual deviations.
        Self {
            intercept: NormalPrior { mean: 0.0, sd: 1_000.0 },
            slope: NormalPrior { mean: 0.0, sd: 1_000.0 },
            indiv_intercept_sd: 2.0,
            indiv_slope_sd: 0.5,
        }
    }
}

impl PriorConfig {
    /// Informative preset for Ct kinetics: peaks near Ct 20, roughly unit
    /// daily clearance.
    pub fn informative() -> Self {
        Self {
            intercept: NormalPrior { mean: 20.0, sd: 5.0 },
            slope: NormalPrior { mean: 1.5, sd: 1.0 },
            ..Self::default()
        }
    }

    /// Whether all hyperparameters are numerically valid.
    pub fn is_valid(&self) -> bool {
        self.intercept.mean.is_finite()
            && self.slope.mean.is_finite()
            && self.intercept.sd.is_finite()
            && self.intercept.sd > 0.0
            && self.slope.sd.is_finite()
            && self.slope.sd > 0.0
            && self.indiv_intercept_sd.is_finite()
            && self.indiv_intercept_sd > 0.0
            && self.indiv_slope_sd.is_finite()
            && self.indiv_slope_sd > 0.0
    }
}

/// Prior specification: backend defaults or an explicit configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorSpec {
    Default,
    Informative(PriorConfig),
}

impl PriorSpec {
    pub fn resolve(&self) -> PriorConfig {
        match self {
            PriorSpec::Default => PriorConfig::default(),
            PriorSpec::Informative(config) => *config,
        }
    }
}

/// A complete regression specification handed to a fitting backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitSpec {
    pub random_effects: RandomEffectsSpec,
    pub priors: PriorSpec,
}

/// Sampler configuration passed through to the fitting backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub chains: usize,
    pub draws_per_chain: usize,
    /// Target acceptance rate ("adapt_delta"-style knob). Carried for
    /// backend compatibility; backends without step-size adaptation only
    /// validate it.
    pub target_accept: f64,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            draws_per_chain: 500,
            target_accept: 0.95,
            seed: 1,
        }
    }
}

/// Split scale-reduction value above which a fit is flagged unreliable.
pub const RHAT_THRESHOLD: f64 = 1.01;

/// Effective-sample-size floor below which a fit is flagged unreliable.
pub const ESS_THRESHOLD: f64 = 600.0;

/// Machine-readable convergence report attached to every fitted model.
///
/// Poor values never abort a fit; callers inspect [`FitDiagnostics::is_reliable`]
/// and decide whether to flag or exclude the model downstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Worst split scale-reduction statistic across monitored parameters.
    pub max_rhat: f64,
    /// Smallest bulk effective sample size across monitored parameters.
    pub min_ess_bulk: f64,
    /// Smallest tail effective sample size across monitored parameters.
    pub min_ess_tail: f64,
    pub n_chains: usize,
    pub n_draws: usize,
}

impl FitDiagnostics {
    pub fn is_reliable(&self) -> bool {
        self.max_rhat < RHAT_THRESHOLD
            && self.min_ess_bulk >= ESS_THRESHOLD
            && self.min_ess_tail >= ESS_THRESHOLD
    }
}

/// A `(individual_id, time)` pair predictions are requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPoint {
    pub individual_id: u32,
    pub time: u32,
}

/// How to produce predictions for individual ids absent from the training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NewIndividualSampling {
    /// Refuse: unseen ids make the query invalid.
    None,
    /// Predict the population-average trajectory (zero individual deviation,
    /// no added variance).
    PopulationAverage,
    /// Draw a fresh individual-effect realization per posterior draw from
    /// the fitted population distribution.
    PopulationGaussianDraw,
}

/// Options controlling a prediction call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictOptions {
    pub allow_new_individuals: bool,
    pub new_individual_sampling: NewIndividualSampling,
    /// Seed for the predictive-noise and new-individual draws.
    pub seed: u64,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            allow_new_individuals: false,
            new_individual_sampling: NewIndividualSampling::None,
            seed: 0,
        }
    }
}

/// One predictive distribution, summarized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub individual_id: u32,
    pub time: u32,
    /// Posterior mean of the linear predictor.
    pub point: f64,
    /// 2.5th percentile of the posterior predictive draws.
    pub lower: f64,
    /// 97.5th percentile of the posterior predictive draws.
    pub upper: f64,
}

/// Predictions for one query set, row order matching the query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionSet {
    pub rows: Vec<PredictionRow>,
}

/// One aligned comparison entry: a labeled prediction joined to ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub label: String,
    pub individual_id: u32,
    pub time: u32,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// `None` when no truth row exists for `(individual_id, time)` — key
    /// mismatches stay explicit instead of being dropped.
    pub ground_truth: Option<f64>,
}
