//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through RoundRng instances derived from an
//! explicit master seed.
//!
//! Seeds are derived hierarchically: the batch derives one seed per
//! job from its master seed, and each run derives one seed per round
//! from its job seed. Derivation mixes the parent seed with the child
//! index through a splitmix-style finalizer, so sibling streams AND
//! streams across levels stay decorrelated — two parallel jobs never
//! share a draw sequence.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::types::RoundIndex;

const STREAM_MULT: u64 = 0x9e37_79b9_7f4a_7c15;

fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Derive an independent child seed from a parent seed and a stable
/// child index. The index assignment must never change once published
/// — reindexing changes every downstream stream.
pub fn derive_seed(parent: u64, index: u64) -> u64 {
    mix(parent.wrapping_add(index.wrapping_mul(STREAM_MULT)))
}

/// All round RNGs for one simulation run.
pub struct RngBank {
    run_seed: u64,
}

impl RngBank {
    pub fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }

    pub fn for_round(&self, round: RoundIndex) -> RoundRng {
        RoundRng::from_seed(derive_seed(self.run_seed, round))
    }
}

/// The deterministic RNG for a single round.
///
/// Cloning yields a replay of the exact same draw sequence; the
/// attack counterfactual relies on this.
#[derive(Clone)]
pub struct RoundRng {
    inner: Pcg64Mcg,
}

impl RoundRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Sample a normal via Box-Muller. A non-positive spread collapses
    /// to the mean without consuming draws.
    pub fn normal(&mut self, mean: f64, sd: f64) -> f64 {
        if sd <= 0.0 {
            return mean;
        }
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        mean + sd * radius * (std::f64::consts::TAU * u2).cos()
    }
}
