use engine::EngineGateway;
use tokio::sync::{broadcast, oneshot};

use super::events::TrainerEvent;
use super::snapshot::TrainerSnapshot;
use crate::error::TrainerError;
use crate::library::PuzzleFilter;
use crate::modes::{ModeKind, ModeSummary};
use crate::persistence::Settings;
use crate::verifier::Verdict;

/// Result of one submitted move, sent once the verifier has decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub san: String,
    pub verdict: Verdict,
    /// `Some(solved)` when this move finished the puzzle.
    pub completed: Option<bool>,
}

/// One engine line for the hint panel, moves in SAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintLine {
    pub rank: u8,
    pub score: String,
    pub moves: Vec<String>,
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, TrainerError>>;

/// Commands sent to the trainer actor. Each embeds a oneshot for the reply.
pub enum TrainerCommand {
    StartMode {
        kind: ModeKind,
        filter: PuzzleFilter,
        reply: Reply<TrainerSnapshot>,
    },
    NextPuzzle {
        reply: Reply<TrainerSnapshot>,
    },
    /// Move in UCI (`e2e4`) or SAN (`Nf3`).
    SubmitMove {
        text: String,
        reply: Reply<MoveReport>,
    },
    EndMode {
        reply: Reply<ModeSummary>,
    },
    Hint {
        reply: Reply<Vec<HintLine>>,
    },
    /// Stored solution line from the puzzle start, in UCI.
    Solution {
        reply: Reply<Vec<String>>,
    },
    UpdateSettings {
        settings: Settings,
        reply: Reply<Settings>,
    },
    ResetProgress {
        reply: Reply<TrainerSnapshot>,
    },
    AttachEngine {
        gateway: EngineGateway,
        reply: oneshot::Sender<()>,
    },
    StopEngine {
        reply: oneshot::Sender<()>,
    },
    GetSnapshot {
        reply: oneshot::Sender<TrainerSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(TrainerSnapshot, broadcast::Receiver<TrainerEvent>)>,
    },
    Shutdown,
}
