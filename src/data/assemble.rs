//! Dataset flattening.
//!
//! Fitting backends consume a flat `(individual_id, time, observed_ct)`
//! table. The transform is pure: no randomness, no failure modes, and an
//! empty dataset yields an empty table.

use crate::domain::{CtRow, CtTable, Dataset};

/// Flatten a dataset into a table, individual-major and time-ascending.
///
/// Trajectories are already time-ascending by construction, so this is a
/// straight concatenation in trajectory order.
pub fn to_table(dataset: &Dataset) -> CtTable {
    let mut rows = Vec::with_capacity(dataset.n_observations());
    for trajectory in &dataset.trajectories {
        for obs in &trajectory.observations {
            rows.push(CtRow {
                individual_id: trajectory.individual.id,
                time: obs.time,
                observed_ct: obs.observed_ct,
            });
        }
    }
    CtTable { rows }
}
