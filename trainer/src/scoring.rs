//! Rating, streak and level bookkeeping for finished puzzles.

use crate::error::TrainerError;
use crate::persistence::{
    now_timestamp, AppState, AttemptRecord, PersistenceError, PuzzleProgress, Settings,
    StateRepository,
};

pub const RATING_FLOOR: u32 = 300;
pub const FAILURE_PENALTY: u32 = 12;
pub const LEVEL_STREAK: u32 = 5;
/// Attempts older than this are dropped when a save needs room.
pub const PRUNE_AGE_SECS: u64 = 30 * 24 * 60 * 60;
pub const MAX_HISTORY: usize = 500;

/// Round `value / divisor` half up, as a whole number.
pub(crate) fn round_div(value: i32, divisor: i32) -> i32 {
    (f64::from(value) / f64::from(divisor) + 0.5).floor() as i32
}

/// Rating gained for a solve with this swing.
pub fn rating_gain(swing: i32) -> u32 {
    (10 + round_div(swing, 20)).clamp(3, 24) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleOutcome {
    pub puzzle_id: String,
    pub solved: bool,
    pub swing: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
    pub rating_before: u32,
    pub rating: u32,
    pub streak: u32,
    pub level: u32,
    pub level_up: bool,
    /// False when scoring was switched off and only the attempt was logged.
    pub scored: bool,
}

impl ScoreChange {
    pub fn rating_delta(&self) -> i64 {
        i64::from(self.rating) - i64::from(self.rating_before)
    }
}

/// Apply one finished puzzle to `progress`.
pub fn apply_outcome(
    progress: &mut PuzzleProgress,
    outcome: &PuzzleOutcome,
    scoring_enabled: bool,
    now: u64,
) -> ScoreChange {
    let rating_before = progress.rating;
    let mut level_up = false;

    if scoring_enabled {
        if outcome.solved {
            progress.streak += 1;
            progress.rating += rating_gain(outcome.swing);
        } else {
            progress.streak = 0;
            progress.rating = progress
                .rating
                .saturating_sub(FAILURE_PENALTY)
                .max(RATING_FLOOR);
        }
        if progress.streak > 0 && progress.streak % LEVEL_STREAK == 0 {
            progress.level += 1;
            level_up = true;
        }
    }

    progress.history.push(AttemptRecord {
        id: outcome.puzzle_id.clone(),
        solved: outcome.solved,
        timestamp: now,
        unscored: !scoring_enabled,
    });

    ScoreChange {
        rating_before,
        rating: progress.rating,
        streak: progress.streak,
        level: progress.level,
        level_up,
        scored: scoring_enabled,
    }
}

/// Drop attempts older than [`PRUNE_AGE_SECS`] and keep at most
/// [`MAX_HISTORY`] of the newest. Returns how many were removed.
pub fn prune_history(history: &mut Vec<AttemptRecord>, now: u64) -> usize {
    let before = history.len();
    let cutoff = now.saturating_sub(PRUNE_AGE_SECS);
    history.retain(|r| r.timestamp >= cutoff);
    if history.len() > MAX_HISTORY {
        history.drain(..history.len() - MAX_HISTORY);
    }
    before - history.len()
}

/// Owns the persisted state and writes it through after every change.
pub struct Scorekeeper {
    store: Box<dyn StateRepository>,
    state: AppState,
}

impl Scorekeeper {
    /// Load saved state, falling back to defaults when none is readable.
    pub fn open(store: Box<dyn StateRepository>) -> Self {
        let state = match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => AppState::default(),
            Err(e) => {
                tracing::warn!("Could not read saved progress, starting fresh: {}", e);
                AppState::default()
            }
        };
        let state = AppState {
            settings: state.settings.normalized(),
            ..state
        };
        Self { store, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn progress(&self) -> &PuzzleProgress {
        &self.state.puzzle
    }

    /// Apply and persist a finished puzzle. On a write failure the change is
    /// still applied in memory.
    pub fn record(&mut self, outcome: &PuzzleOutcome) -> (ScoreChange, Result<(), TrainerError>) {
        let scoring_enabled = self.state.settings.scoring_enabled;
        let change = apply_outcome(
            &mut self.state.puzzle,
            outcome,
            scoring_enabled,
            now_timestamp(),
        );
        tracing::info!(
            puzzle = %outcome.puzzle_id,
            solved = outcome.solved,
            rating = change.rating,
            streak = change.streak,
            scored = change.scored,
            "Puzzle recorded"
        );
        (change, self.persist())
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<Settings, TrainerError> {
        self.state.settings = settings.normalized();
        self.persist()?;
        Ok(self.state.settings.clone())
    }

    /// Back to a fresh rating, keeping settings.
    pub fn reset_progress(&mut self) -> Result<(), TrainerError> {
        self.state.puzzle = PuzzleProgress::default();
        self.persist()
    }

    fn persist(&mut self) -> Result<(), TrainerError> {
        let first = match self.store.save(&self.state) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let pruned = prune_history(&mut self.state.puzzle.history, now_timestamp());
        tracing::warn!(pruned, "Saving progress failed, retrying: {}", first);

        self.store.save(&self.state).map_err(|e: PersistenceError| {
            tracing::error!("Saving progress failed again: {}", e);
            TrainerError::PersistenceWriteFailure(e.to_string())
        })
    }
}
