//! Design-matrix layout for the linear mixed model.
//!
//! The regression of observed Ct on time carries two fixed columns
//! (intercept, time) followed by per-individual indicator columns for
//! whichever random effects the spec enables. `CoefficientLayout` owns the
//! id-to-column mapping so the fitter and the predictor agree on it.

use crate::domain::{CtTable, RandomEffectsSpec};

/// Column layout shared by fitting and prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientLayout {
    /// Training-set individual ids, ascending.
    ids: Vec<u32>,
    random_effects: RandomEffectsSpec,
}

/// Fixed-effect column count (intercept + time).
pub const N_FIXED: usize = 2;

impl CoefficientLayout {
    /// Build the layout from the individual ids present in a table.
    pub fn from_table(table: &CtTable, random_effects: RandomEffectsSpec) -> Self {
        let mut ids = table.individual_ids();
        ids.sort_unstable();
        Self { ids, random_effects }
    }

    pub fn random_effects(&self) -> RandomEffectsSpec {
        self.random_effects
    }

    pub fn n_individuals(&self) -> usize {
        self.ids.len()
    }

    pub fn has_random_intercept(&self) -> bool {
        matches!(
            self.random_effects,
            RandomEffectsSpec::InterceptOnly | RandomEffectsSpec::InterceptAndSlope
        )
    }

    pub fn has_random_slope(&self) -> bool {
        self.random_effects == RandomEffectsSpec::InterceptAndSlope
    }

    /// Total coefficient count.
    pub fn n_coefficients(&self) -> usize {
        let mut p = N_FIXED;
        if self.has_random_intercept() {
            p += self.ids.len();
        }
        if self.has_random_slope() {
            p += self.ids.len();
        }
        p
    }

    /// Position of `id` among the training individuals, if seen.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Column of the intercept deviation for the `idx`-th individual.
    pub fn intercept_column(&self, idx: usize) -> usize {
        N_FIXED + idx
    }

    /// Column of the slope deviation for the `idx`-th individual.
    pub fn slope_column(&self, idx: usize) -> usize {
        N_FIXED + self.ids.len() + idx
    }

    /// Coefficient names in column order (fixed effects first).
    pub fn names(&self) -> Vec<String> {
        let mut out = vec!["intercept".to_string(), "time".to_string()];
        if self.has_random_intercept() {
            out.extend(self.ids.iter().map(|id| format!("b0[{id}]")));
        }
        if self.has_random_slope() {
            out.extend(self.ids.iter().map(|id| format!("b1[{id}]")));
        }
        out
    }
}

/// Fill one design row for an observation of individual `idx` at time `t`.
///
/// `idx` of `None` means "no individual columns" (a population-level row).
///
/// # Panics
/// Panics if `out` does not have length `layout.n_coefficients()`.
pub fn fill_design_row(layout: &CoefficientLayout, idx: Option<usize>, t: f64, out: &mut [f64]) {
    assert_eq!(out.len(), layout.n_coefficients());
    out.fill(0.0);
    out[0] = 1.0;
    out[1] = t;
    if let Some(idx) = idx {
        if layout.has_random_intercept() {
            out[layout.intercept_column(idx)] = 1.0;
        }
        if layout.has_random_slope() {
            out[layout.slope_column(idx)] = t;
        }
    }
}
