use std::collections::HashSet;
use std::sync::Arc;

use chess::{
    convert_cozy_castling_to_uci, format_uci_move, parse_san, Game, GameError, HistoryEntry,
    PieceColor,
};
use cozy_chess::Move;
use engine::{EngineError, EngineGateway};
use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::commands::{MoveReport, Reply};
use super::snapshot::{ProgressView, PuzzleView, TrainerSnapshot};
use crate::config::TrainerConfig;
use crate::error::TrainerError;
use crate::library::{day_number, PickStrategy, PuzzleFilter, PuzzlePool};
use crate::modes::{ModeKind, ModeSession};
use crate::persistence::now_timestamp;
use crate::puzzle::Puzzle;
use crate::resolver::{PositionResolver, ResolvedPosition};
use crate::scoring::Scorekeeper;
use crate::verifier::Verdict;

/// Where the current puzzle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting for the engine to play the side the player does not hold.
    PuzzleLoaded,
    AwaitingPlayerMove,
    Verifying,
    AwaitingOpponentReply,
    Complete { solved: bool },
}

impl Phase {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Results of background tasks, tagged with the epoch they were started in.
/// Anything from an older epoch is dropped on arrival.
#[derive(Debug)]
pub(crate) enum Work {
    Verified {
        epoch: u64,
        verdict: Verdict,
    },
    OpponentMoved {
        epoch: u64,
        result: Result<Option<Move>, EngineError>,
    },
    Advance {
        epoch: u64,
    },
    SolveTimeout {
        epoch: u64,
    },
    RushTick {
        epoch: u64,
    },
    OpponentAttempt {
        epoch: u64,
    },
}

pub(crate) struct ActiveMode {
    pub session: ModeSession,
    pub filter: PuzzleFilter,
    pub token: CancellationToken,
    pub epoch: u64,
}

pub(crate) struct PendingMove {
    pub san: String,
    pub reply: Reply<MoveReport>,
}

pub(crate) struct ActivePuzzle {
    pub puzzle: Puzzle,
    pub start_fen: String,
    /// Starts at `start_fen`; history holds only puzzle moves.
    pub game: Game,
    pub player: PieceColor,
    /// Plies in the stored solution, when it replays legally.
    pub solution_plies: Option<usize>,
    pub failure_recorded: bool,
    /// An opponent move failed for lack of an engine.
    pub stalled: bool,
    pub deadline: Option<Instant>,
    pub pending: Option<PendingMove>,
    /// Child of the mode token.
    pub token: CancellationToken,
    pub epoch: u64,
}

impl ActivePuzzle {
    pub fn player_to_move(&self) -> bool {
        PieceColor::from(self.game.side_to_move()) == self.player
    }

    /// The player's last move used up the stored line.
    pub fn line_exhausted(&self) -> bool {
        self.solution_plies
            .is_some_and(|plies| self.game.history().len() >= plies)
    }

    /// Fail an unanswered move submission; the puzzle moved on without it.
    pub fn abandon_pending(&mut self, err: TrainerError) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.reply.send(Err(err));
        }
    }
}

/// A puzzle chosen for play plus any broken puzzles passed over on the way.
pub(crate) struct Choice {
    pub puzzle: Puzzle,
    pub position: ResolvedPosition,
    pub skipped: Vec<(String, TrainerError)>,
}

/// Internal mutable state, owned entirely by the trainer actor. No locks.
pub(crate) struct TrainerState {
    pub config: TrainerConfig,
    pub pool: Arc<PuzzlePool>,
    pub resolver: PositionResolver,
    pub gateway: EngineGateway,
    pub scorekeeper: Scorekeeper,
    pub rng: StdRng,
    pub mode: Option<ActiveMode>,
    pub puzzle: Option<ActivePuzzle>,
    pub phase: Phase,
    pub message: Option<String>,
    pub last_puzzle: Option<String>,
    /// Puzzles whose data failed to resolve; never picked again.
    pub broken: HashSet<String>,
    pub work_tx: mpsc::Sender<Work>,
    epoch: u64,
}

impl TrainerState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TrainerConfig,
        pool: Arc<PuzzlePool>,
        resolver: PositionResolver,
        gateway: EngineGateway,
        scorekeeper: Scorekeeper,
        rng: StdRng,
        work_tx: mpsc::Sender<Work>,
    ) -> Self {
        Self {
            config,
            pool,
            resolver,
            gateway,
            scorekeeper,
            rng,
            mode: None,
            puzzle: None,
            phase: Phase::Idle,
            message: None,
            last_puzzle: None,
            broken: HashSet::new(),
            work_tx,
            epoch: 0,
        }
    }

    pub fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn mode_kind(&self) -> Option<ModeKind> {
        self.mode.as_ref().map(|m| m.session.kind())
    }

    pub fn choose_colour(&mut self) -> PieceColor {
        match self.config.player_color {
            Some(colour) => colour,
            None if self.rng.gen_bool(0.5) => PieceColor::White,
            None => PieceColor::Black,
        }
    }

    /// Pick and resolve the next puzzle for `kind`, skipping broken data.
    pub fn choose_puzzle(
        &mut self,
        kind: ModeKind,
        filter: &PuzzleFilter,
    ) -> Result<Choice, TrainerError> {
        let everything = PuzzleFilter::default();
        let mut skipped = Vec::new();
        loop {
            let strategy = match kind {
                ModeKind::Daily => PickStrategy::Daily {
                    day: day_number(now_timestamp()),
                },
                ModeKind::Rated => PickStrategy::NearestRating {
                    rating: self.scorekeeper.progress().rating,
                    window: self.config.rated_window(),
                },
                ModeKind::Custom => PickStrategy::Uniform { filter },
                ModeKind::Rush | ModeKind::Battle => PickStrategy::Uniform {
                    filter: &everything,
                },
            };
            let puzzle = self
                .pool
                .pick(
                    strategy,
                    self.last_puzzle.as_deref(),
                    &self.broken,
                    &mut self.rng,
                )
                .cloned()
                .ok_or(TrainerError::NoPuzzles)?;

            match self.resolver.resolve(&puzzle) {
                Ok(position) => {
                    return Ok(Choice {
                        puzzle,
                        position,
                        skipped,
                    })
                }
                Err(e) if e.is_data_integrity() => {
                    tracing::warn!(puzzle = %puzzle.id, "Skipping broken puzzle: {}", e);
                    self.broken.insert(puzzle.id.clone());
                    skipped.push((puzzle.id, e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn snapshot(&self) -> TrainerSnapshot {
        let progress = self.scorekeeper.progress();
        let puzzle = self.puzzle.as_ref();
        let (rush, battle) = match self.mode.as_ref().map(|m| &m.session) {
            Some(ModeSession::Rush(rush)) => (Some(rush.clone()), None),
            Some(ModeSession::Battle(battle)) => (None, Some(battle.clone())),
            _ => (None, None),
        };

        TrainerSnapshot {
            mode: self.mode_kind(),
            phase: self.phase,
            puzzle: puzzle.map(|p| PuzzleView {
                id: p.puzzle.id.clone(),
                name: p.puzzle.display_name().to_string(),
                rating: p.puzzle.rating,
                themes: p.puzzle.themes.clone(),
                hint: p.puzzle.hint.clone(),
            }),
            fen: puzzle.map(|p| p.game.to_fen()),
            player: puzzle.map(|p| p.player),
            side_to_move: puzzle.map(|p| p.game.side_to_move().into()),
            moves: puzzle
                .map(|p| p.game.history().iter().map(|e| e.san.clone()).collect())
                .unwrap_or_default(),
            message: self.message.clone(),
            progress: ProgressView {
                rating: progress.rating,
                streak: progress.streak,
                level: progress.level,
                solved: progress.solved_count(),
                attempts: progress.history.len(),
            },
            settings: self.scorekeeper.settings().clone(),
            rush,
            battle,
            timer_remaining_secs: puzzle
                .and_then(|p| p.deadline)
                .filter(|_| !self.phase.is_complete())
                .map(|d| d.saturating_duration_since(Instant::now()).as_secs()),
            engine_ready: self.gateway.is_running(),
        }
    }
}

/// Play one step of a stored solution, written in SAN or UCI.
pub(crate) fn play_step(game: &mut Game, step: &str) -> Result<HistoryEntry, GameError> {
    game.play_san(step).or_else(|_| game.play_uci(step))
}

/// Number of plies in `best` if every step is legal from `game`.
pub(crate) fn solution_plies(game: &Game, best: &[String]) -> Option<usize> {
    if best.is_empty() {
        return None;
    }
    let mut replay = game.clone();
    for step in best {
        if let Err(e) = play_step(&mut replay, step) {
            tracing::warn!(step = %step, "Stored solution does not replay: {}", e);
            return None;
        }
    }
    Some(best.len())
}

/// The stored solution in UCI, up to the first step that does not replay.
pub(crate) fn solution_uci(start_fen: &str, best: &[String]) -> Vec<String> {
    let Ok(mut replay) = Game::from_fen(start_fen) else {
        return Vec::new();
    };
    let mut line = Vec::with_capacity(best.len());
    for step in best {
        let before = replay.position().clone();
        match play_step(&mut replay, step) {
            Ok(entry) => line.push(format_uci_move(convert_cozy_castling_to_uci(
                &before, entry.mv,
            ))),
            Err(_) => break,
        }
    }
    line
}

/// Accept a move typed as UCI or SAN; returns it in board encoding.
pub(crate) fn parse_player_move(game: &Game, text: &str) -> Result<Move, TrainerError> {
    let text = text.trim();
    if let Ok(mv) = game.resolve_uci(text) {
        if game.position().is_legal(mv) {
            return Ok(mv);
        }
    }
    parse_san(game.position(), text).map_err(|_| TrainerError::InvalidMove(text.to_string()))
}
