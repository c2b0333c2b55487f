//! Validated, immutable simulation parameters.
//!
//! RULE: every simulation entry point (OracleModel, grid expansion)
//! validates its parameters before any random draw happens. Downstream
//! modules never re-check ranges.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// The reward mechanism family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffType {
    /// Fixed reward for the majority side, lost deposit for the minority.
    Basic,
    /// Losers' deposits are redistributed among winners.
    Redistributive,
    /// Reward grows with the size of the winning coalition.
    Symbiotic,
}

impl PayoffType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Redistributive => "redistributive",
            Self::Symbiotic => "symbiotic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "redistributive" => Some(Self::Redistributive),
            "symbiotic" => Some(Self::Symbiotic),
            _ => None,
        }
    }
}

/// The full parameter set for one simulation run.
///
/// `x_mean` is the Schelling focal point: the expected share of the
/// other jurors voting X. `x_guess_noise` spreads each juror's private
/// estimate of that count; `noise` perturbs perceived payoffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub num_jurors:    u32,
    pub base_reward:   f64,
    pub deposit:       f64,
    pub lambda_qre:    f64,
    pub noise:         f64,
    pub x_mean:        f64,
    pub x_guess_noise: f64,
    pub payoff_type:   PayoffType,
    pub attack:        bool,
    pub epsilon:       f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            num_jurors:    10,
            base_reward:   1.0,
            deposit:       0.0,
            lambda_qre:    1.5,
            noise:         0.1,
            x_mean:        0.5,
            x_guess_noise: 0.0,
            payoff_type:   PayoffType::Basic,
            attack:        false,
            epsilon:       0.0,
        }
    }
}

impl SimulationParameters {
    /// Range checks. Rejected parameter sets never reach a simulator.
    pub fn validate(&self) -> SimResult<()> {
        if self.num_jurors < 1 {
            return Err(invalid("num_jurors", self.num_jurors as f64, "must be >= 1"));
        }
        check_non_negative("base_reward", self.base_reward)?;
        check_non_negative("deposit", self.deposit)?;
        check_non_negative("lambda_qre", self.lambda_qre)?;
        check_unit_interval("noise", self.noise)?;
        check_unit_interval("x_mean", self.x_mean)?;
        check_unit_interval("x_guess_noise", self.x_guess_noise)?;
        check_non_negative("epsilon", self.epsilon)?;
        Ok(())
    }

    /// The attacked parameter set's matched baseline: identical in every
    /// respect except that the bribe is switched off.
    pub fn without_attack(&self) -> Self {
        Self {
            attack: false,
            epsilon: 0.0,
            ..self.clone()
        }
    }
}

fn invalid(name: &'static str, value: f64, constraint: &'static str) -> SimError {
    SimError::InvalidParameter { name, value, constraint }
}

fn check_non_negative(name: &'static str, value: f64) -> SimResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(name, value, "must be finite and >= 0"));
    }
    Ok(())
}

fn check_unit_interval(name: &'static str, value: f64) -> SimResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(name, value, "must be within [0, 1]"));
    }
    Ok(())
}
