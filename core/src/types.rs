//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// One juror's binary choice. The realized outcome of a round reuses
/// the same enum: whichever side holds the majority becomes the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    X,
    Y,
}

impl Vote {
    pub fn opposite(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
        }
    }
}

/// Zero-based round index within one simulation run.
pub type RoundIndex = u64;

/// Zero-based job index within one batch, in grid enumeration order.
pub type JobIndex = u64;

/// The canonical batch-run identifier.
pub type RunId = String;
