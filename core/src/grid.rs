//! Parameter grid expansion for batch runs.
//!
//! Enumeration order is fixed and reproducible: the cartesian product
//! iterates num_jurors, base_reward, deposit, lambda_qre, noise,
//! x_mean, x_guess_noise — last axis fastest. A job's index is its
//! position in that order and also selects its derived seed, so a
//! grid re-run with the same master seed reproduces every job.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::params::{PayoffType, SimulationParameters};
use crate::rng::derive_seed;
use crate::types::JobIndex;

/// One grid axis: a fixed value, a min/max/step sweep, or an already
/// expanded list of concrete values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSet {
    Fixed(f64),
    Values(Vec<f64>),
    Range { min: f64, max: f64, step: f64 },
}

impl ValueSet {
    /// The ordered concrete values for this axis. Range expansion
    /// includes `max` when it lands within half a step of the last
    /// increment (arange-style sweep).
    pub fn expand(&self) -> Vec<f64> {
        match self {
            Self::Fixed(v) => vec![*v],
            Self::Values(vs) => vs.clone(),
            Self::Range { min, max, step } => {
                if *step <= 0.0 || max < min {
                    return vec![*min];
                }
                let mut out = Vec::new();
                let mut i = 0u32;
                loop {
                    let v = min + f64::from(i) * step;
                    if v > max + step * 0.5 {
                        break;
                    }
                    out.push(v);
                    i += 1;
                }
                out
            }
        }
    }
}

fn fixed_zero() -> ValueSet {
    ValueSet::Fixed(0.0)
}

/// The user-selected sweep, deserialized from the runner's JSON
/// config. Axes not listed as sweepable stay scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub num_jurors:    ValueSet,
    pub base_reward:   ValueSet,
    pub deposit:       ValueSet,
    pub lambda_qre:    ValueSet,
    pub noise:         ValueSet,
    pub x_mean:        ValueSet,
    #[serde(default = "fixed_zero")]
    pub x_guess_noise: ValueSet,
    pub payoff_type:   PayoffType,
    #[serde(default)]
    pub attack:        bool,
    #[serde(default)]
    pub epsilon:       f64,
    pub num_simulations: u64,
}

/// One unit of batch work: a validated parameter set plus its rounds
/// budget and its own derived seed.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_index: JobIndex,
    pub params: SimulationParameters,
    pub num_simulations: u64,
    pub seed: u64,
}

impl ParameterGrid {
    /// Cartesian expansion into the ordered job sequence. Every job's
    /// parameters are validated here, before any simulation work.
    pub fn expand_jobs(&self, master_seed: u64) -> SimResult<Vec<BatchJob>> {
        if self.num_simulations < 1 {
            return Err(SimError::InvalidParameter {
                name: "num_simulations",
                value: self.num_simulations as f64,
                constraint: "must be >= 1",
            });
        }

        let jurors = self.num_jurors.expand();
        let rewards = self.base_reward.expand();
        let deposits = self.deposit.expand();
        let lambdas = self.lambda_qre.expand();
        let noises = self.noise.expand();
        let x_means = self.x_mean.expand();
        let x_guesses = self.x_guess_noise.expand();

        let mut jobs = Vec::new();
        for &m in &jurors {
            for &p in &rewards {
                for &d in &deposits {
                    for &lambda in &lambdas {
                        for &noise in &noises {
                            for &x_mean in &x_means {
                                for &x_guess in &x_guesses {
                                    let params = SimulationParameters {
                                        num_jurors: m.round() as u32,
                                        base_reward: p,
                                        deposit: d,
                                        lambda_qre: lambda,
                                        noise,
                                        x_mean,
                                        x_guess_noise: x_guess,
                                        payoff_type: self.payoff_type,
                                        attack: self.attack,
                                        epsilon: self.epsilon,
                                    };
                                    params.validate()?;
                                    let job_index = jobs.len() as JobIndex;
                                    jobs.push(BatchJob {
                                        job_index,
                                        params,
                                        num_simulations: self.num_simulations,
                                        seed: derive_seed(master_seed, job_index),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        if jobs.is_empty() {
            return Err(SimError::EmptyGrid);
        }

        log::debug!(
            "grid expanded: {} jobs × {} rounds each",
            jobs.len(),
            self.num_simulations,
        );
        Ok(jobs)
    }
}
