use chess::PieceColor;
use engine::EngineError;

/// Errors surfaced by the trainer. Engine failures during verification never
/// show up here as a penalty; they become an `Unverifiable` verdict instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrainerError {
    #[error("Engine is not ready")]
    EngineNotReady,
    #[error("Engine did not become ready within {0} ms")]
    EngineTimeout(u64),
    #[error("Engine could not be started: {0}")]
    EngineUnavailable(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Source game not found: {0}")]
    SourceGameNotFound(String),
    #[error("Puzzle {puzzle} expects {expected} to move, position has {actual} to move")]
    UnresolvablePosition {
        puzzle: String,
        expected: PieceColor,
        actual: PieceColor,
    },
    #[error("Ply {ply} is out of range for game {game_id} ({available} plies)")]
    PlyOutOfRange {
        game_id: String,
        ply: usize,
        available: usize,
    },
    #[error("Invalid puzzle position: {0}")]
    InvalidPosition(String),
    #[error("Failed to save progress: {0}")]
    PersistenceWriteFailure(String),
    #[error("Busy")]
    Busy,
    #[error("No active puzzle")]
    NoActivePuzzle,
    #[error("Puzzle already finished")]
    PuzzleFinished,
    #[error("No puzzles match the current selection")]
    NoPuzzles,
    #[error("Not available in {0} mode")]
    NotAllowedInMode(&'static str),
    #[error("Puzzle {0} has no stored solution")]
    NoSolution(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrainerError {
    /// Short actionable text for the player.
    pub fn user_message(&self) -> String {
        match self {
            Self::EngineNotReady => "Engine stopped. Start it to continue.".to_string(),
            Self::EngineTimeout(_) => {
                "Engine did not respond. Restart it to continue.".to_string()
            }
            Self::EngineUnavailable(_) => {
                "Engine could not be started. Check the Stockfish path.".to_string()
            }
            Self::InvalidMove(_) => "That move is not legal here.".to_string(),
            Self::SourceGameNotFound(_)
            | Self::UnresolvablePosition { .. }
            | Self::PlyOutOfRange { .. }
            | Self::InvalidPosition(_) => "This puzzle is broken and was skipped.".to_string(),
            Self::PersistenceWriteFailure(_) => {
                "Progress could not be saved. It is kept for this session.".to_string()
            }
            Self::Busy => "Please wait for the current move to finish.".to_string(),
            Self::NoActivePuzzle => "Start a puzzle first.".to_string(),
            Self::PuzzleFinished => "Puzzle finished. Load the next one.".to_string(),
            Self::NoPuzzles => "No puzzles match. Widen the filter.".to_string(),
            Self::NotAllowedInMode(mode) => format!("Not available during {}.", mode),
            Self::NoSolution(_) => "No solution is stored for this puzzle.".to_string(),
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Puzzle data problems. The puzzle is skipped rather than failed.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::SourceGameNotFound(_)
                | Self::UnresolvablePosition { .. }
                | Self::PlyOutOfRange { .. }
                | Self::InvalidPosition(_)
        )
    }
}

impl From<EngineError> for TrainerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotReady | EngineError::Cancelled => Self::EngineNotReady,
            EngineError::Timeout(ms) => Self::EngineTimeout(ms),
            EngineError::NotFound | EngineError::Spawn(_) => {
                Self::EngineUnavailable(err.to_string())
            }
            EngineError::Io(_) | EngineError::Protocol(_) => Self::Internal(err.to_string()),
        }
    }
}
