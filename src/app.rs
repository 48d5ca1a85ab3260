//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - simulates trajectory datasets
//! - runs model fitting and the comparison pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, CompareArgs, FitCmdArgs, ModelMenu, SamplerArgs, SimArgs, SimulateArgs};
use crate::domain::{
    FitSpec, PopulationParams, PriorConfig, PriorSpec, RandomEffectsSpec, SamplerConfig, SimConfig,
};
use crate::error::AppError;
use crate::fit::{ConjugateBackend, FitBackend, FitSummary};

pub mod pipeline;

/// Entry point for the `ctk` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Compare(args) => handle_compare(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = sim_config_from_args(&args.sim);
    let dataset = crate::data::generate(&config)?;

    println!("{}", crate::report::format_dataset_summary(&dataset, &config));

    if let Some(path) = &args.export {
        let table = crate::data::to_table(&dataset);
        crate::io::write_dataset_csv(path, &table)?;
        println!("Exported {} rows to {}", table.len(), path.display());
    }

    Ok(())
}

fn handle_fit(args: FitCmdArgs) -> Result<(), AppError> {
    let config = sim_config_from_args(&args.sim);
    let dataset = crate::data::generate(&config)?;
    let table = crate::data::to_table(&dataset);

    let spec = FitSpec {
        random_effects: args.random_effects,
        priors: prior_spec(args.informative),
    };
    let sampler = sampler_from_args(&args.sampler);
    let label = spec_label(args.random_effects, args.informative);

    let backend = ConjugateBackend;
    let model = backend.fit(&table, &spec, &sampler)?;
    let summary = FitSummary::from_model(label, &model);

    println!("{}", crate::report::format_fit_summary(&summary));

    if let Some(path) = &args.export_model {
        crate::io::write_summary_json(path, &summary)?;
        println!("Exported fit summary to {}", path.display());
    }

    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let config = pipeline::CompareConfig {
        sim: sim_config_from_args(&args.sim),
        eval_count: args.eval_count,
        specs: compare_specs(args.models, args.informative),
        sampler: sampler_from_args(&args.sampler),
        predict_seed: args.predict_seed,
    };

    let out = pipeline::run_compare(&ConjugateBackend, &config)?;

    let flags: Vec<(String, String)> = out
        .fitted
        .iter()
        .filter(|(_, diag)| !diag.is_reliable())
        .map(|(label, diag)| {
            (
                label.clone(),
                format!(
                    "diagnostics outside thresholds: rhat_max={:.4} ess_bulk={:.0} ess_tail={:.0}",
                    diag.max_rhat, diag.min_ess_bulk, diag.min_ess_tail
                ),
            )
        })
        .collect();

    println!(
        "{}",
        crate::report::format_comparison_summary(&out.summaries, &flags, &out.failed)
    );
    println!("{}", crate::report::format_comparison_head(&out.comparison, args.top));

    if let Some(path) = &args.export {
        crate::io::write_comparison_csv(path, &out.comparison)?;
        println!("Exported {} comparison rows to {}", out.comparison.len(), path.display());
    }

    Ok(())
}

fn sim_config_from_args(args: &SimArgs) -> SimConfig {
    SimConfig {
        n_individuals: args.individuals,
        max_time: args.max_time,
        population: PopulationParams {
            peak_mean: args.peak_mean,
            peak_sd: args.peak_sd,
            slope_mean: args.slope_mean,
            slope_sd: args.slope_sd,
        },
        noise_sd: args.noise_sd,
        detection_limit: args.detection_limit,
        seed: args.seed,
        first_id: 1,
    }
}

fn sampler_from_args(args: &SamplerArgs) -> SamplerConfig {
    SamplerConfig {
        chains: args.chains,
        draws_per_chain: args.draws,
        target_accept: args.adapt_delta,
        seed: args.sampler_seed,
    }
}

fn prior_spec(informative: bool) -> PriorSpec {
    if informative {
        PriorSpec::Informative(PriorConfig::informative())
    } else {
        PriorSpec::Default
    }
}

fn spec_label(random_effects: RandomEffectsSpec, informative: bool) -> String {
    let base = match random_effects {
        RandomEffectsSpec::None => "pooled",
        RandomEffectsSpec::InterceptOnly => "rand_intercept",
        RandomEffectsSpec::InterceptAndSlope => "rand_slope",
    };
    if informative {
        format!("{base}_informative")
    } else {
        base.to_string()
    }
}

/// Expand the menu into labeled specs, fitted in order of complexity.
fn compare_specs(menu: ModelMenu, informative: bool) -> Vec<(String, FitSpec)> {
    let mut kinds: Vec<RandomEffectsSpec> = match menu {
        ModelMenu::Pooled => vec![RandomEffectsSpec::None],
        ModelMenu::Intercept => vec![RandomEffectsSpec::InterceptOnly],
        ModelMenu::Slope => vec![RandomEffectsSpec::InterceptAndSlope],
        ModelMenu::All => vec![
            RandomEffectsSpec::None,
            RandomEffectsSpec::InterceptOnly,
            RandomEffectsSpec::InterceptAndSlope,
        ],
    };

    let mut specs: Vec<(String, FitSpec)> = kinds
        .drain(..)
        .map(|re| {
            (
                spec_label(re, false),
                FitSpec { random_effects: re, priors: PriorSpec::Default },
            )
        })
        .collect();

    // The informative variant rides on the hierarchical model.
    if informative {
        specs.push((
            spec_label(RandomEffectsSpec::InterceptAndSlope, true),
            FitSpec {
                random_effects: RandomEffectsSpec::InterceptAndSlope,
                priors: PriorSpec::Informative(PriorConfig::informative()),
            },
        ));
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_all_expands_in_complexity_order() {
        let specs = compare_specs(ModelMenu::All, true);
        let labels: Vec<&str> = specs.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            vec!["pooled", "rand_intercept", "rand_slope", "rand_slope_informative"]
        );
    }

    #[test]
    fn single_menu_entries_expand_to_one_spec() {
        assert_eq!(compare_specs(ModelMenu::Pooled, false).len(), 1);
        assert_eq!(compare_specs(ModelMenu::Intercept, false).len(), 1);
        assert_eq!(compare_specs(ModelMenu::Slope, false).len(), 1);
    }
}
