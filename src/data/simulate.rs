//! Synthetic Ct-trajectory generation.
//!
//! Each individual gets latent `(peak, slope)` draws from the population
//! distributions, then one noisy observation per time point until either
//! follow-up ends or an observation crosses the detection limit. The crossing
//! observation is retained and everything after it is dropped, mirroring a
//! collection protocol that stops after the first negative test.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{
    Dataset, Individual, Observation, PopulationParams, SimConfig, Trajectory, SLOPE_FLOOR,
};
use crate::error::AppError;

/// Generate a dataset of right-truncated trajectories.
///
/// Fully deterministic: the same config (seed included) reproduces the
/// dataset bit for bit. All draws come from one seeded stream in a fixed
/// order — per individual peak, then raw slope, then per-time noise.
pub fn generate(config: &SimConfig) -> Result<Dataset, AppError> {
    validate(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let peak_dist = normal(config.population.peak_mean, config.population.peak_sd)?;
    let slope_dist = normal(config.population.slope_mean, config.population.slope_sd)?;
    let noise_dist = normal(0.0, config.noise_sd)?;

    let mut trajectories = Vec::with_capacity(config.n_individuals);

    for i in 0..config.n_individuals {
        let id = config.first_id + i as u32;
        let peak = peak_dist.sample(&mut rng);
        let raw_slope = slope_dist.sample(&mut rng);
        let slope = raw_slope.max(SLOPE_FLOOR);
        let individual = Individual { id, peak, slope };

        let mut observations = Vec::new();
        let mut censored = false;
        for t in 0..=config.max_time {
            let true_ct = peak + slope * f64::from(t);
            let observed_ct = true_ct + noise_dist.sample(&mut rng);
            observations.push(Observation { time: t, true_ct, observed_ct });
            if observed_ct > config.detection_limit {
                censored = true;
                break;
            }
        }

        trajectories.push(Trajectory {
            individual,
            observations,
            censored,
        });
    }

    Ok(Dataset { trajectories })
}

fn validate(config: &SimConfig) -> Result<(), AppError> {
    if config.n_individuals == 0 {
        return Err(AppError::new(2, "Individual count must be >= 1."));
    }
    let p = &config.population;
    if !(p.peak_mean.is_finite() && p.slope_mean.is_finite()) {
        return Err(AppError::new(2, "Population means must be finite."));
    }
    if !(p.peak_sd.is_finite() && p.peak_sd >= 0.0 && p.slope_sd.is_finite() && p.slope_sd >= 0.0) {
        return Err(AppError::new(2, "Population sds must be finite and >= 0."));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd > 0.0) {
        return Err(AppError::new(2, "Measurement noise sd must be finite and > 0."));
    }
    if !config.detection_limit.is_finite() {
        return Err(AppError::new(2, "Detection limit must be finite."));
    }
    Ok(())
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(mean, sd).map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_config() -> SimConfig {
        SimConfig {
            n_individuals: 5,
            max_time: 15,
            population: PopulationParams {
                peak_mean: 17.8,
                peak_sd: 2.2,
                slope_mean: 1.7,
                slope_sd: 0.425,
            },
            noise_sd: 3.0,
            detection_limit: 40.0,
            seed: 58,
            first_id: 1,
        }
    }

    #[test]
    fn generate_is_reproducible_for_fixed_seed() {
        let config = reference_config();
        let a = generate(&config).unwrap();
        let b = generate(&config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reference_scenario_has_five_bounded_trajectories() {
        let data = generate(&reference_config()).unwrap();
        assert_eq!(data.n_individuals(), 5);

        let mut ids: Vec<u32> = data.trajectories.iter().map(|t| t.individual.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        for trajectory in &data.trajectories {
            assert!(!trajectory.observations.is_empty());
            assert!(trajectory.observations.len() <= 16);
        }
    }

    #[test]
    fn times_are_strictly_increasing_and_bounded() {
        let mut config = reference_config();
        config.n_individuals = 50;
        config.seed = 7;
        let data = generate(&config).unwrap();

        for trajectory in &data.trajectories {
            let times: Vec<u32> = trajectory.observations.iter().map(|o| o.time).collect();
            for pair in times.windows(2) {
                assert!(pair[0] < pair[1]);
            }
            assert!(*times.last().unwrap() <= config.max_time);
        }
    }

    #[test]
    fn exceedance_appears_only_as_last_observation() {
        let mut config = reference_config();
        config.n_individuals = 50;
        config.seed = 11;
        let data = generate(&config).unwrap();

        for trajectory in &data.trajectories {
            let n = trajectory.observations.len();
            for (idx, obs) in trajectory.observations.iter().enumerate() {
                if obs.observed_ct > config.detection_limit {
                    assert_eq!(idx, n - 1, "exceedance must terminate the trajectory");
                    assert!(trajectory.censored);
                }
            }
            if !trajectory.censored {
                assert_eq!(n as u32, config.max_time + 1);
            }
        }
    }

    #[test]
    fn peak_above_limit_yields_length_one_trajectory() {
        // Peaks sit ~50 noise sds above the limit, so the very first
        // observation crosses it.
        let mut config = reference_config();
        config.population.peak_mean = 45.0;
        config.population.peak_sd = 0.0;
        config.noise_sd = 0.1;
        let data = generate(&config).unwrap();

        for trajectory in &data.trajectories {
            assert_eq!(trajectory.observations.len(), 1);
            assert!(trajectory.censored);
        }
    }

    #[test]
    fn slope_floor_is_enforced() {
        let mut config = reference_config();
        config.population.slope_mean = -5.0;
        config.population.slope_sd = 0.1;
        let data = generate(&config).unwrap();

        for trajectory in &data.trajectories {
            assert!(trajectory.individual.slope >= SLOPE_FLOOR);
        }
    }

    #[test]
    fn invalid_parameters_fail_before_sampling() {
        let mut config = reference_config();
        config.n_individuals = 0;
        assert!(generate(&config).unwrap_err().is_invalid_parameter());

        let mut config = reference_config();
        config.noise_sd = 0.0;
        assert!(generate(&config).unwrap_err().is_invalid_parameter());

        let mut config = reference_config();
        config.population.peak_sd = -1.0;
        assert!(generate(&config).unwrap_err().is_invalid_parameter());

        let mut config = reference_config();
        config.detection_limit = f64::NAN;
        assert!(generate(&config).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn first_id_offsets_the_cohort() {
        let mut config = reference_config();
        config.first_id = 100;
        let data = generate(&config).unwrap();
        let ids: Vec<u32> = data.trajectories.iter().map(|t| t.individual.id).collect();
        assert_eq!(ids, vec![100, 101, 102, 103, 104]);
    }
}
