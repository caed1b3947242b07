//! Engine score type shared by the engine gateway and the trainer.

use serde::{Deserialize, Serialize};

/// Centipawn magnitude a mate score maps to in [`AnalysisScore::to_cp`].
pub const MATE_CP: i32 = 100_000;

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// zero or negative N = side-to-move gets mated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Collapse to centipawns. Any forced mate becomes `±MATE_CP` regardless
    /// of distance.
    pub fn to_cp(&self) -> i32 {
        match self {
            Self::Centipawns(cp) => *cp,
            Self::Mate(m) if *m > 0 => MATE_CP,
            Self::Mate(_) => -MATE_CP,
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }
}

/// Returns true if the given 1-indexed ply belongs to White.
/// Odd plies (1, 3, 5, …) are White moves; even plies are Black.
pub fn is_white_ply(ply: u32) -> bool {
    ply % 2 == 1
}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
