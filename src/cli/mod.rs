//! Command-line parsing for the Ct-trajectory harness.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the simulation/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{RandomEffectsSpec, DEFAULT_DETECTION_LIMIT};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ctk", version, about = "Simulated Ct-trajectory fitting and model comparison")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a synthetic dataset and print its summary.
    Simulate(SimulateArgs),
    /// Simulate, fit one model, and print its posterior summary.
    Fit(FitCmdArgs),
    /// Fit several models and compare their held-out predictions.
    Compare(CompareArgs),
}

/// Which model variants `compare` fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelMenu {
    /// Complete pooling only.
    Pooled,
    /// Random-intercept model only.
    Intercept,
    /// Random intercept+slope model only.
    Slope,
    /// All three variants.
    All,
}

/// Shared simulation flags. Defaults reproduce the reference scenario's
/// population parameters.
#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    /// Number of individuals to simulate.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub individuals: usize,

    /// Inclusive maximum follow-up time index.
    #[arg(long, default_value_t = 15)]
    pub max_time: u32,

    /// Population mean of the peak (time-0) Ct value.
    #[arg(long, default_value_t = 17.8)]
    pub peak_mean: f64,

    /// Population sd of the peak Ct value.
    #[arg(long, default_value_t = 2.2)]
    pub peak_sd: f64,

    /// Population mean of the per-day Ct increase.
    #[arg(long, default_value_t = 1.7)]
    pub slope_mean: f64,

    /// Population sd of the per-day Ct increase.
    #[arg(long, default_value_t = 0.425)]
    pub slope_sd: f64,

    /// Measurement noise sd.
    #[arg(long, default_value_t = 3.0)]
    pub noise_sd: f64,

    /// Detection limit; observations above it end follow-up.
    #[arg(long, default_value_t = DEFAULT_DETECTION_LIMIT)]
    pub detection_limit: f64,

    /// Random seed for trajectory simulation.
    #[arg(long, default_value_t = 58)]
    pub seed: u64,
}

/// Sampler flags shared by `fit` and `compare`.
#[derive(Debug, Args, Clone)]
pub struct SamplerArgs {
    /// Number of sampling chains.
    #[arg(long, default_value_t = 4)]
    pub chains: usize,

    /// Posterior draws per chain.
    #[arg(long, default_value_t = 500)]
    pub draws: usize,

    /// Target acceptance rate tuning knob.
    #[arg(long, default_value_t = 0.95)]
    pub adapt_delta: f64,

    /// Random seed for posterior draws.
    #[arg(long, default_value_t = 1)]
    pub sampler_seed: u64,
}

/// Options for `ctk simulate`.
#[derive(Debug, Parser)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// Export the flattened dataset to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for `ctk fit`.
#[derive(Debug, Parser)]
pub struct FitCmdArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    #[command(flatten)]
    pub sampler: SamplerArgs,

    /// Which per-individual random effects the model carries.
    #[arg(long, value_enum, default_value = "intercept-and-slope")]
    pub random_effects: RandomEffectsSpec,

    /// Use the informative Ct-kinetics priors instead of backend defaults.
    #[arg(long)]
    pub informative: bool,

    /// Export the fit summary to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,
}

/// Options for `ctk compare`.
#[derive(Debug, Parser)]
pub struct CompareArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    #[command(flatten)]
    pub sampler: SamplerArgs,

    /// Which model variants to fit and compare.
    #[arg(long, value_enum, default_value = "all")]
    pub models: ModelMenu,

    /// Also fit an informative-priors variant of the hierarchical model.
    #[arg(long)]
    pub informative: bool,

    /// Number of held-out individuals to simulate as ground truth.
    #[arg(long, default_value_t = 4)]
    pub eval_count: usize,

    /// Random seed for predictive draws.
    #[arg(long, default_value_t = 0)]
    pub predict_seed: u64,

    /// Comparison rows printed to the terminal.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Export the aligned comparison table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}
