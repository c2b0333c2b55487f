//! Historical dispute records — the real-data counterpart of a
//! simulated round.
//!
//! A dispute's final-round vote list reduces to the same tally shape a
//! simulated round produces (X_votes, Y_votes, majority, percentages),
//! so real and simulated outcomes flow through identical downstream
//! analysis. The core only defines the vote list and the tally; file
//! ingestion of court exports lives in the runner.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::types::Vote;

/// One recorded vote: a binary choice, or abstention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedChoice {
    X,
    Y,
    NotVoted,
}

/// Tally summary of one dispute round, schema-aligned with
/// `RoundResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub x_votes:     u32,
    pub y_votes:     u32,
    pub majority:    Vote,
    pub x_percent:   f64,
    pub y_percent:   f64,
    pub total_votes: u32,
}

/// Count the cast votes, ignoring abstentions. Ties go to X, matching
/// the simulator's convention. A list with no cast votes is rejected.
pub fn tally_votes(votes: &[RecordedChoice]) -> SimResult<VoteTally> {
    let mut x_votes: u32 = 0;
    let mut y_votes: u32 = 0;
    for vote in votes {
        match vote {
            RecordedChoice::X => x_votes += 1,
            RecordedChoice::Y => y_votes += 1,
            RecordedChoice::NotVoted => {}
        }
    }

    let total_votes = x_votes + y_votes;
    if total_votes == 0 {
        return Err(SimError::EmptyDispute);
    }

    let majority = if y_votes > x_votes { Vote::Y } else { Vote::X };

    Ok(VoteTally {
        x_votes,
        y_votes,
        majority,
        x_percent: 100.0 * f64::from(x_votes) / f64::from(total_votes),
        y_percent: 100.0 * f64::from(y_votes) / f64::from(total_votes),
        total_votes,
    })
}
