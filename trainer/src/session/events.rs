use chess::PieceColor;

use super::snapshot::TrainerSnapshot;
use crate::modes::ModeSummary;
use crate::scoring::ScoreChange;
use crate::verifier::Verdict;

/// Events broadcast from the trainer actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum TrainerEvent {
    /// Full state snapshot after any mutation.
    StateChanged(TrainerSnapshot),
    PuzzleLoaded {
        puzzle_id: String,
        player: PieceColor,
    },
    /// Bad puzzle data; another puzzle was picked instead.
    PuzzleSkipped {
        puzzle_id: String,
        reason: String,
    },
    MoveVerified {
        san: String,
        verdict: Verdict,
    },
    OpponentMoved {
        san: String,
    },
    PuzzleCompleted {
        puzzle_id: String,
        solved: bool,
        /// Present when the result went through the rating.
        change: Option<ScoreChange>,
    },
    /// The simulated battle opponent got there first.
    OpponentSolved {
        puzzle_id: String,
    },
    ModeEnded(ModeSummary),
    /// User-facing error notification.
    Error(String),
}
