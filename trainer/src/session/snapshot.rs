use chess::PieceColor;

use super::state::Phase;
use crate::modes::{BattleSession, ModeKind, RushSession};
use crate::persistence::Settings;

/// Complete, immutable snapshot of trainer state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSnapshot {
    pub mode: Option<ModeKind>,
    pub phase: Phase,
    pub puzzle: Option<PuzzleView>,
    pub fen: Option<String>,
    pub player: Option<PieceColor>,
    pub side_to_move: Option<PieceColor>,
    /// SAN of every move played since the puzzle started.
    pub moves: Vec<String>,
    pub message: Option<String>,
    pub progress: ProgressView,
    pub settings: Settings,
    pub rush: Option<RushSession>,
    pub battle: Option<BattleSession>,
    pub timer_remaining_secs: Option<u64>,
    pub engine_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleView {
    pub id: String,
    pub name: String,
    pub rating: u32,
    pub themes: Vec<String>,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressView {
    pub rating: u32,
    pub streak: u32,
    pub level: u32,
    pub solved: usize,
    pub attempts: usize,
}
