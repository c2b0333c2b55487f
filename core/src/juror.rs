//! Per-juror quantal-response decision model.
//!
//! Pipeline, per juror per round:
//!   1. Sample a private noisy belief of how many others vote X,
//!      normal around x_mean·(M−1), clamped to [0, M−1]. The belief is
//!      drawn for every mechanism; Basic payoff VALUES ignore it, but
//!      it still weighs the outcome expectation below.
//!   2. Build the believed payoff table from that belief.
//!   3. Perturb each table entry with independent perception noise.
//!   4. Utility of a vote is its expected payoff under the belief
//!      about which outcome wins: the believed X-vote share weights
//!      the X-wins column against the Y-wins column. Under a p+epsilon
//!      attack this is what makes voting Y dominant — the bribed entry
//!      pays even when X wins.
//!   5. P(vote=X) = exp(λU_X) / (exp(λU_X) + exp(λU_Y)), computed with
//!      max-subtraction so large λ·U cannot overflow.
//!   6. Vote = Bernoulli(P(vote=X)).

use crate::params::SimulationParameters;
use crate::payoff::{payoff_table, PayoffTable};
use crate::rng::RoundRng;
use crate::types::Vote;

pub struct JurorDecisionModel<'a> {
    params: &'a SimulationParameters,
}

impl<'a> JurorDecisionModel<'a> {
    pub fn new(params: &'a SimulationParameters) -> Self {
        Self { params }
    }

    /// Full decision: probability then Bernoulli draw.
    pub fn decide(&self, rng: &mut RoundRng) -> Vote {
        let p_x = self.vote_probability(rng);
        if rng.chance(p_x) {
            Vote::X
        } else {
            Vote::Y
        }
    }

    /// Steps 1–5 of the pipeline. Consumes the belief and perception
    /// draws from `rng` and returns P(vote=X).
    pub fn vote_probability(&self, rng: &mut RoundRng) -> f64 {
        let others = (self.params.num_jurors - 1) as f64;

        let belief = rng
            .normal(
                self.params.x_mean * others,
                self.params.x_guess_noise * others,
            )
            .clamp(0.0, others);

        let believed = payoff_table(self.params, belief);
        let observed = self.perturb(&believed, rng);
        let (u_x, u_y) = self.utilities(&observed, belief);

        qre_probability(self.params.lambda_qre, u_x, u_y)
    }

    /// Independent perception noise on every table entry.
    fn perturb(&self, table: &PayoffTable, rng: &mut RoundRng) -> PayoffTable {
        let sd = self.params.noise;
        PayoffTable {
            x_when_x: rng.normal(table.x_when_x, sd),
            x_when_y: rng.normal(table.x_when_y, sd),
            y_when_x: rng.normal(table.y_when_x, sd),
            y_when_y: rng.normal(table.y_when_y, sd),
        }
    }

    /// Expected payoff per vote, weighting the outcome columns by the
    /// believed X-win chance. A lone juror (M=1) falls back to the
    /// focal share — their belief covers zero other voters.
    fn utilities(&self, table: &PayoffTable, belief: f64) -> (f64, f64) {
        let others = (self.params.num_jurors - 1) as f64;
        let w = if others > 0.0 {
            belief / others
        } else {
            self.params.x_mean
        };

        let u_x = w * table.x_when_x + (1.0 - w) * table.x_when_y;
        let u_y = w * table.y_when_x + (1.0 - w) * table.y_when_y;
        (u_x, u_y)
    }
}

/// Stabilized two-action softmax, restricted to the X component.
/// λ=0 collapses to exactly 0.5 regardless of the utilities.
pub fn qre_probability(lambda: f64, u_x: f64, u_y: f64) -> f64 {
    let a = lambda * u_x;
    let b = lambda * u_y;
    let peak = a.max(b);
    let ea = (a - peak).exp();
    let eb = (b - peak).exp();
    ea / (ea + eb)
}
