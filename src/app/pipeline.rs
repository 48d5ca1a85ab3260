//! Shared comparison-pipeline logic used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! simulate -> assemble -> fit each model -> predict held-out grid ->
//! align with truth -> summarize.
//!
//! Per-model failures do not abort the run: a failed fit or predict call is
//! recorded by label and the remaining models are still compared.

use crate::compare::{align, summarize, LabelSummary, LabeledPredictions};
use crate::data::{generate, to_table};
use crate::domain::{
    ComparisonRow, CtTable, Dataset, FitDiagnostics, FitSpec, NewIndividualSampling,
    PredictOptions, QueryPoint, SamplerConfig, SimConfig,
};
use crate::error::AppError;
use crate::fit::FitBackend;

/// Configuration for one `ctk compare` run.
#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub sim: SimConfig,
    /// Held-out individuals simulated from the same population as truth.
    pub eval_count: usize,
    /// Labeled model specifications, fitted in order.
    pub specs: Vec<(String, FitSpec)>,
    pub sampler: SamplerConfig,
    pub predict_seed: u64,
}

/// All computed outputs of a single `ctk compare` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub train: Dataset,
    pub table: CtTable,
    /// Labels and diagnostics of the models that fitted and predicted.
    pub fitted: Vec<(String, FitDiagnostics)>,
    /// Labels that failed to fit or predict, with the reason.
    pub failed: Vec<(String, String)>,
    pub truth: CtTable,
    pub comparison: Vec<ComparisonRow>,
    pub summaries: Vec<LabelSummary>,
}

/// Execute the full comparison pipeline and return the computed outputs.
pub fn run_compare<B: FitBackend>(backend: &B, config: &CompareConfig) -> Result<RunOutput, AppError> {
    if config.eval_count == 0 {
        return Err(AppError::new(2, "Evaluation cohort size must be >= 1."));
    }
    if config.specs.is_empty() {
        return Err(AppError::new(2, "No model specifications to fit."));
    }

    // 1) Training cohort.
    let train = generate(&config.sim)?;
    let table = to_table(&train);
    log::info!(
        "fitting {} model(s) on {} observations from {} individuals",
        config.specs.len(),
        table.len(),
        train.n_individuals()
    );

    // 2) Fit each labeled spec; failures are per-label, not fatal.
    let mut models: Vec<(String, B::Model)> = Vec::new();
    let mut failed: Vec<(String, String)> = Vec::new();
    for (label, spec) in &config.specs {
        match backend.fit(&table, spec, &config.sampler) {
            Ok(model) => {
                let diag = B::diagnostics(&model);
                if !diag.is_reliable() {
                    log::warn!(
                        "fit '{label}' has unreliable diagnostics (rhat_max={:.4}, ess_bulk={:.0}, ess_tail={:.0})",
                        diag.max_rhat,
                        diag.min_ess_bulk,
                        diag.min_ess_tail
                    );
                }
                models.push((label.clone(), model));
            }
            Err(e) => {
                log::warn!("fit '{label}' failed: {e}");
                failed.push((label.clone(), e.to_string()));
            }
        }
    }
    if models.is_empty() {
        return Err(AppError::new(4, "Every configured model failed to fit."));
    }

    // 3) Held-out cohort from the same population: derived seed, disjoint ids.
    let eval_config = SimConfig {
        n_individuals: config.eval_count,
        seed: config.sim.seed.wrapping_add(1),
        first_id: config.sim.first_id + config.sim.n_individuals as u32,
        ..config.sim.clone()
    };
    let eval = generate(&eval_config)?;
    let truth = to_table(&eval);

    // 4) Predict the full follow-up grid for every held-out individual.
    //    Times past an individual's truncation point join to null truth.
    let query: Vec<QueryPoint> = eval
        .trajectories
        .iter()
        .flat_map(|trajectory| {
            let id = trajectory.individual.id;
            (0..=config.sim.max_time).map(move |time| QueryPoint { individual_id: id, time })
        })
        .collect();
    let opts = PredictOptions {
        allow_new_individuals: true,
        new_individual_sampling: NewIndividualSampling::PopulationGaussianDraw,
        seed: config.predict_seed,
    };

    let mut sets: Vec<LabeledPredictions> = Vec::new();
    let mut fitted: Vec<(String, FitDiagnostics)> = Vec::new();
    for (label, model) in &models {
        match backend.predict(model, &query, &opts) {
            Ok(set) => {
                fitted.push((label.clone(), *B::diagnostics(model)));
                sets.push(LabeledPredictions { label: label.clone(), set });
            }
            Err(e) => {
                log::warn!("predict '{label}' failed: {e}");
                failed.push((label.clone(), e.to_string()));
            }
        }
    }

    // 5) Align and summarize.
    let comparison = align(&sets, &truth);
    let summaries = summarize(&comparison);

    Ok(RunOutput {
        train,
        table,
        fitted,
        failed,
        truth,
        comparison,
        summaries,
    })
}
