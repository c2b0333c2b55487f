//! Multi-round simulation driver.
//!
//! RULES:
//!   - Rounds are independent: each gets its own RNG derived from the
//!     run seed and the round index.
//!   - The oracle owns every history it accumulates; results echo the
//!     input parameters for downstream labeling.
//!   - Progress goes through the injected observer only.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::observer::ProgressObserver;
use crate::params::SimulationParameters;
use crate::rng::RngBank;
use crate::round::RoundSimulator;
use crate::types::Vote;

/// Aggregates across all rounds of one `run_simulations` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub params: SimulationParameters,
    pub seed:   u64,

    pub x_wins: u64,
    pub y_wins: u64,

    pub history_x:    Vec<u32>,
    pub history_y:    Vec<u32>,
    pub avg_payoff_x: Vec<f64>,
    pub avg_payoff_y: Vec<f64>,

    pub average_votes_x: f64,
    pub average_votes_y: f64,

    /// Populated only when the run was attacked: the matched
    /// counterfactual vote counts and the percentage-point excess of
    /// the observed Y-win rate over the counterfactual Y-win rate.
    pub history_x_no_attack:  Option<Vec<u32>>,
    pub history_y_no_attack:  Option<Vec<u32>>,
    pub attack_success_rate:  Option<f64>,
}

impl SimulationResult {
    pub fn outcome_count(&self, outcome: Vote) -> u64 {
        match outcome {
            Vote::X => self.x_wins,
            Vote::Y => self.y_wins,
        }
    }

    pub fn num_rounds(&self) -> u64 {
        self.history_x.len() as u64
    }
}

pub struct OracleModel {
    params: SimulationParameters,
    seed:   u64,
}

impl OracleModel {
    /// Rejects invalid parameters before any simulation work begins.
    pub fn new(params: SimulationParameters, seed: u64) -> SimResult<Self> {
        params.validate()?;
        Ok(Self { params, seed })
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Run `num_rounds` rounds and aggregate.
    pub fn run_simulations(
        &self,
        num_rounds: u64,
        observer: &mut dyn ProgressObserver,
    ) -> SimResult<SimulationResult> {
        if num_rounds < 1 {
            return Err(SimError::InvalidParameter {
                name: "num_rounds",
                value: num_rounds as f64,
                constraint: "must be >= 1",
            });
        }

        let bank = RngBank::new(self.seed);
        let simulator = RoundSimulator::new(&self.params);

        let n = num_rounds as usize;
        let mut x_wins: u64 = 0;
        let mut y_wins: u64 = 0;
        let mut history_x = Vec::with_capacity(n);
        let mut history_y = Vec::with_capacity(n);
        let mut avg_payoff_x = Vec::with_capacity(n);
        let mut avg_payoff_y = Vec::with_capacity(n);

        let mut cf_y_wins: u64 = 0;
        let mut history_x_no_attack = self.params.attack.then(|| Vec::with_capacity(n));
        let mut history_y_no_attack = self.params.attack.then(|| Vec::with_capacity(n));

        for round in 0..num_rounds {
            let mut rng = bank.for_round(round);

            let result = if self.params.attack {
                let (attacked, baseline) = simulator.run_paired(&mut rng);
                if baseline.majority == Vote::Y {
                    cf_y_wins += 1;
                }
                if let Some(h) = history_x_no_attack.as_mut() {
                    h.push(baseline.x_votes);
                }
                if let Some(h) = history_y_no_attack.as_mut() {
                    h.push(baseline.y_votes);
                }
                attacked
            } else {
                simulator.run(&mut rng)
            };

            match result.majority {
                Vote::X => x_wins += 1,
                Vote::Y => y_wins += 1,
            }
            history_x.push(result.x_votes);
            history_y.push(result.y_votes);
            avg_payoff_x.push(result.avg_payoff_x);
            avg_payoff_y.push(result.avg_payoff_y);

            observer.on_progress(
                (round + 1) as f64 / num_rounds as f64,
                &format!("round {}/{num_rounds}", round + 1),
            );
        }

        let average_votes_x =
            history_x.iter().map(|&v| v as f64).sum::<f64>() / num_rounds as f64;
        let average_votes_y =
            history_y.iter().map(|&v| v as f64).sum::<f64>() / num_rounds as f64;

        let attack_success_rate = self.params.attack.then(|| {
            100.0 * (y_wins as f64 - cf_y_wins as f64) / num_rounds as f64
        });

        log::debug!(
            "run complete: seed={} rounds={num_rounds} x_wins={x_wins} y_wins={y_wins}",
            self.seed,
        );

        Ok(SimulationResult {
            params: self.params.clone(),
            seed: self.seed,
            x_wins,
            y_wins,
            history_x,
            history_y,
            avg_payoff_x,
            avg_payoff_y,
            average_votes_x,
            average_votes_y,
            history_x_no_attack,
            history_y_no_attack,
            attack_success_rate,
        })
    }
}
