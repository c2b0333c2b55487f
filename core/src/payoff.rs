//! Payoff mechanisms — the 2×2 table mapping (own vote × realized
//! outcome) to one juror's payoff.
//!
//! `x` is always the number of OTHER jurors (excluding self) voting X.
//! Callers pass a believed count (possibly fractional) when building a
//! juror's decision table, or a realized whole count when settling a
//! finished round. The table is recomputed per juror per round for the
//! count-dependent mechanisms.
//!
//! Degenerate denominators: `x` is clamped to [0, M−1] and both
//! Redistributive denominators are saturated at 1.0, so x=M yields a
//! finite value instead of a division fault.

use crate::params::{PayoffType, SimulationParameters};
use crate::types::Vote;

/// The four payoffs for one juror, keyed by (vote, outcome).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffTable {
    pub x_when_x: f64,
    pub x_when_y: f64,
    pub y_when_x: f64,
    pub y_when_y: f64,
}

impl PayoffTable {
    pub fn payoff(&self, vote: Vote, outcome: Vote) -> f64 {
        match (vote, outcome) {
            (Vote::X, Vote::X) => self.x_when_x,
            (Vote::X, Vote::Y) => self.x_when_y,
            (Vote::Y, Vote::X) => self.y_when_x,
            (Vote::Y, Vote::Y) => self.y_when_y,
        }
    }
}

/// Build the payoff table for `x` others voting X.
pub fn payoff_table(params: &SimulationParameters, x: f64) -> PayoffTable {
    let m = params.num_jurors as f64;
    let p = params.base_reward;
    let d = params.deposit;
    let x = x.clamp(0.0, m - 1.0);

    // Winning-side payouts per mechanism.
    let (x_when_x, y_when_y) = match params.payoff_type {
        PayoffType::Basic => (p, p),
        PayoffType::Redistributive => (
            ((m - x - 1.0) * d + m * p) / (x + 1.0).max(1.0),
            (x * d + m * p) / (m - x).max(1.0),
        ),
        PayoffType::Symbiotic => (p * (x + 1.0) / m, p * (m - x) / m),
    };

    // The bribe contract makes a losing Y vote whole: the X-winning
    // payout plus epsilon, instead of the forfeited deposit.
    let y_when_x = if params.attack {
        x_when_x + params.epsilon
    } else {
        -d
    };

    PayoffTable {
        x_when_x,
        x_when_y: -d,
        y_when_x,
        y_when_y,
    }
}
