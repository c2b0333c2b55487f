//! One full voting round.
//!
//! Tie-break: Y is declared majority only when y_votes strictly
//! exceeds x_votes; ties go to X. The asymmetry is part of the
//! contract and shows up in win-rate statistics.

use serde::{Deserialize, Serialize};

use crate::juror::JurorDecisionModel;
use crate::params::SimulationParameters;
use crate::payoff::payoff_table;
use crate::rng::RoundRng;
use crate::types::Vote;

/// The settled result of a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub x_votes:      u32,
    pub y_votes:      u32,
    pub majority:     Vote,
    pub avg_payoff_x: f64,
    pub avg_payoff_y: f64,
}

pub struct RoundSimulator<'a> {
    params: &'a SimulationParameters,
}

impl<'a> RoundSimulator<'a> {
    pub fn new(params: &'a SimulationParameters) -> Self {
        Self { params }
    }

    pub fn run(&self, rng: &mut RoundRng) -> RoundResult {
        run_round(self.params, rng)
    }

    /// An attack round paired with its no-attack counterfactual.
    ///
    /// The counterfactual replays the identical draw stream (common
    /// random numbers) with only the bribed payoff entry removed, so
    /// the pair isolates the bribe's effect from Monte Carlo noise.
    pub fn run_paired(&self, rng: &mut RoundRng) -> (RoundResult, RoundResult) {
        let mut replay = rng.clone();
        let attacked = run_round(self.params, rng);
        let baseline_params = self.params.without_attack();
        let baseline = run_round(&baseline_params, &mut replay);
        (attacked, baseline)
    }
}

fn run_round(params: &SimulationParameters, rng: &mut RoundRng) -> RoundResult {
    let juror = JurorDecisionModel::new(params);

    let mut x_votes: u32 = 0;
    for _ in 0..params.num_jurors {
        if juror.decide(rng) == Vote::X {
            x_votes += 1;
        }
    }
    let y_votes = params.num_jurors - x_votes;

    let majority = if y_votes > x_votes { Vote::Y } else { Vote::X };

    // Realized payoffs use ACTUAL other-voter counts, not beliefs.
    // Every X voter faces the same realized x (x_votes − 1), so the
    // side average equals a single table evaluation; likewise for Y
    // voters with x = x_votes. An empty side settles at 0.0.
    let avg_payoff_x = if x_votes > 0 {
        payoff_table(params, (x_votes - 1) as f64).payoff(Vote::X, majority)
    } else {
        0.0
    };
    let avg_payoff_y = if y_votes > 0 {
        payoff_table(params, x_votes as f64).payoff(Vote::Y, majority)
    } else {
        0.0
    };

    RoundResult {
        x_votes,
        y_votes,
        majority,
        avg_payoff_x,
        avg_payoff_y,
    }
}
