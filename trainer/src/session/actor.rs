use std::future::Future;
use std::time::Duration;

use chess::{convert_uci_castling_to_cozy, format_line_san, Game, PieceColor};
use engine::EngineGateway;
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::commands::*;
use super::events::TrainerEvent;
use super::snapshot::TrainerSnapshot;
use super::state::*;
use crate::error::TrainerError;
use crate::library::PuzzleFilter;
use crate::modes::{BattleSide, ModeKind, ModeSession, ModeSummary};
use crate::scoring::{PuzzleOutcome, ScoreChange};
use crate::verifier::{MoveVerifier, Verdict};

/// Swing recorded for a puzzle that ran out of time.
const TIMEOUT_SWING: i32 = -100;

type Events = broadcast::Sender<TrainerEvent>;

/// The trainer actor loop.
/// Owns the board and the mode session. Commands and background results are
/// processed one at a time.
pub(crate) async fn run_trainer_actor(
    state: TrainerState,
    cmd_rx: mpsc::Receiver<TrainerCommand>,
    work_rx: mpsc::Receiver<Work>,
    event_tx: Events,
) {
    run_trainer_actor_inner(state, cmd_rx, work_rx, event_tx)
        .instrument(tracing::info_span!("trainer"))
        .await;
}

async fn run_trainer_actor_inner(
    mut state: TrainerState,
    mut cmd_rx: mpsc::Receiver<TrainerCommand>,
    mut work_rx: mpsc::Receiver<Work>,
    event_tx: Events,
) {
    tracing::info!("Trainer actor started");

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TrainerCommand::Shutdown) | None => {
                        tracing::info!("Trainer actor shutting down");
                        finish_mode(&mut state, &event_tx, true);
                        state.gateway.stop().await;
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx).await,
                }
            }

            Some(work) = work_rx.recv() => {
                handle_work(&mut state, work, &event_tx);
            }
        }
    }

    tracing::info!("Trainer actor exited");
}

fn publish(state: &TrainerState, events: &Events) {
    let _ = events.send(TrainerEvent::StateChanged(state.snapshot()));
}

async fn handle_command(state: &mut TrainerState, cmd: TrainerCommand, events: &Events) {
    match cmd {
        TrainerCommand::StartMode {
            kind,
            filter,
            reply,
        } => {
            let result = start_mode(state, kind, filter, events);
            publish(state, events);
            let _ = reply.send(result);
        }
        TrainerCommand::NextPuzzle { reply } => {
            let result = match state.mode_kind() {
                None => Err(TrainerError::NoActivePuzzle),
                Some(kind) if kind.is_competitive() => {
                    Err(TrainerError::NotAllowedInMode(kind.name()))
                }
                Some(_) => load_next(state, events).map(|()| state.snapshot()),
            };
            if result.is_ok() {
                publish(state, events);
            }
            let _ = reply.send(result);
        }
        TrainerCommand::SubmitMove { text, reply } => {
            submit_move(state, &text, reply, events);
        }
        TrainerCommand::EndMode { reply } => {
            let result = finish_mode(state, events, true).ok_or(TrainerError::NoActivePuzzle);
            if result.is_ok() {
                publish(state, events);
            }
            let _ = reply.send(result);
        }
        TrainerCommand::Hint { reply } => request_hint(state, reply),
        TrainerCommand::Solution { reply } => {
            let _ = reply.send(stored_solution(state));
        }
        TrainerCommand::UpdateSettings { settings, reply } => {
            let result = state.scorekeeper.update_settings(settings);
            publish(state, events);
            let _ = reply.send(result);
        }
        TrainerCommand::ResetProgress { reply } => {
            let result = state
                .scorekeeper
                .reset_progress()
                .map(|()| state.snapshot());
            publish(state, events);
            let _ = reply.send(result);
        }
        TrainerCommand::AttachEngine { gateway, reply } => {
            tracing::info!("Engine attached");
            state.gateway = gateway;
            state.message = None;
            resume_stalled(state);
            publish(state, events);
            let _ = reply.send(());
        }
        TrainerCommand::StopEngine { reply } => {
            let gateway = std::mem::replace(&mut state.gateway, EngineGateway::disconnected());
            gateway.stop().await;
            tracing::info!("Engine stopped");
            publish(state, events);
            let _ = reply.send(());
        }
        TrainerCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        TrainerCommand::Subscribe { reply } => {
            let _ = reply.send((state.snapshot(), events.subscribe()));
        }
        TrainerCommand::Shutdown => {}
    }
}

fn handle_work(state: &mut TrainerState, work: Work, events: &Events) {
    tracing::trace!(?work, "Background work finished");
    match work {
        Work::Verified { epoch, verdict } => on_verified(state, epoch, verdict, events),
        Work::OpponentMoved { epoch, result } => {
            let played = match result {
                Ok(Some(mv)) => Ok(mv),
                Ok(None) => Err(TrainerError::Internal("engine found no move".into())),
                Err(e) => Err(e.into()),
            };
            on_opponent_move(state, epoch, played, events);
        }
        Work::Advance { epoch } => {
            let current = state.puzzle.as_ref().is_some_and(|p| p.epoch == epoch);
            if !current || state.mode.is_none() {
                return;
            }
            if let Err(e) = load_next(state, events) {
                tracing::warn!("Could not load the next puzzle: {}", e);
                let _ = events.send(TrainerEvent::Error(e.user_message()));
                finish_mode(state, events, false);
            }
            publish(state, events);
        }
        Work::SolveTimeout { epoch } => on_timeout(state, epoch, events),
        Work::RushTick { epoch } => on_rush_tick(state, epoch, events),
        Work::OpponentAttempt { epoch } => on_opponent_attempt(state, epoch, events),
    }
}

/// Run `work` in the background unless `token` is cancelled first, then hand
/// its result to the actor.
fn spawn_work<F>(token: CancellationToken, work_tx: mpsc::Sender<Work>, work: F)
where
    F: Future<Output = Work> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            done = work => {
                let _ = work_tx.send(done).await;
            }
        }
    });
}

fn spawn_rush_clock(token: CancellationToken, work_tx: mpsc::Sender<Work>, epoch: u64) {
    tokio::spawn(async move {
        let second = Duration::from_secs(1);
        let mut clock = time::interval_at(Instant::now() + second, second);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = clock.tick() => {
                    if work_tx.send(Work::RushTick { epoch }).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Ask the engine for the side the player does not hold, after `delay`.
fn spawn_opponent_move(state: &TrainerState, delay: Duration) {
    let Some(puzzle) = state.puzzle.as_ref() else {
        return;
    };
    let gateway = state.gateway.clone();
    let fen = puzzle.game.to_fen();
    let depth = state.scorekeeper.settings().depth;
    let epoch = puzzle.epoch;
    spawn_work(puzzle.token.clone(), state.work_tx.clone(), async move {
        time::sleep(delay).await;
        Work::OpponentMoved {
            epoch,
            result: gateway.best_move(&fen, depth).await,
        }
    });
}

fn start_mode(
    state: &mut TrainerState,
    kind: ModeKind,
    filter: PuzzleFilter,
    events: &Events,
) -> Result<TrainerSnapshot, TrainerError> {
    finish_mode(state, events, true);

    let epoch = state.next_epoch();
    let token = CancellationToken::new();
    state.mode = Some(ActiveMode {
        session: ModeSession::start(kind, &state.config.rush, &state.config.battle),
        filter,
        token: token.clone(),
        epoch,
    });
    tracing::info!(mode = %kind, "Mode started");

    if let Err(e) = load_next(state, events) {
        tracing::warn!(mode = %kind, "Mode could not start: {}", e);
        token.cancel();
        state.mode = None;
        return Err(e);
    }
    if kind == ModeKind::Rush {
        spawn_rush_clock(token, state.work_tx.clone(), epoch);
    }
    Ok(state.snapshot())
}

/// Replace the current puzzle with a freshly picked one.
fn load_next(state: &mut TrainerState, events: &Events) -> Result<(), TrainerError> {
    let Some(mode) = state.mode.as_ref() else {
        return Err(TrainerError::NoActivePuzzle);
    };
    let kind = mode.session.kind();
    let filter = mode.filter.clone();
    let mode_token = mode.token.clone();

    if let Some(mut old) = state.puzzle.take() {
        old.token.cancel();
        old.abandon_pending(TrainerError::PuzzleFinished);
    }
    state.phase = Phase::Idle;
    state.message = None;

    let choice = state.choose_puzzle(kind, &filter)?;
    for (puzzle_id, err) in &choice.skipped {
        let _ = events.send(TrainerEvent::PuzzleSkipped {
            puzzle_id: puzzle_id.clone(),
            reason: err.to_string(),
        });
    }
    let game = Game::from_fen(&choice.position.fen)
        .map_err(|e| TrainerError::InvalidPosition(e.to_string()))?;
    let to_move = PieceColor::from(game.side_to_move());

    let mut player = state.choose_colour();
    if player != to_move && !state.gateway.is_running() {
        player = to_move;
        state.message = Some("Engine stopped: you play the side to move.".to_string());
    }

    let epoch = state.next_epoch();
    let token = mode_token.child_token();
    let settings = state.scorekeeper.settings();
    let deadline = (!kind.is_competitive() && settings.timer_enabled)
        .then(|| Instant::now() + Duration::from_secs(settings.timer_seconds.into()));
    if let Some(deadline) = deadline {
        spawn_work(token.clone(), state.work_tx.clone(), async move {
            time::sleep_until(deadline).await;
            Work::SolveTimeout { epoch }
        });
    }
    if kind == ModeKind::Battle {
        let roll: f64 = state.rng.gen();
        let delay = state
            .config
            .battle
            .opponent_delay(choice.puzzle.rating, roll);
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Battle opponent started");
        spawn_work(token.clone(), state.work_tx.clone(), async move {
            time::sleep(delay).await;
            Work::OpponentAttempt { epoch }
        });
    }

    let puzzle_id = choice.puzzle.id.clone();
    tracing::info!(puzzle = %puzzle_id, %player, "Puzzle loaded");
    state.last_puzzle = Some(puzzle_id.clone());
    state.puzzle = Some(ActivePuzzle {
        solution_plies: solution_plies(&game, &choice.puzzle.best),
        puzzle: choice.puzzle,
        start_fen: choice.position.fen,
        game,
        player,
        failure_recorded: false,
        stalled: false,
        deadline,
        pending: None,
        token,
        epoch,
    });

    if player == to_move {
        state.phase = Phase::AwaitingPlayerMove;
        if state.message.is_none() {
            state.message = Some(format!("{} to move. Find the best move.", player));
        }
    } else {
        state.phase = Phase::PuzzleLoaded;
        spawn_opponent_move(
            state,
            Duration::from_millis(state.config.pacing.opening_move_ms),
        );
    }

    let _ = events.send(TrainerEvent::PuzzleLoaded { puzzle_id, player });
    Ok(())
}

fn submit_move(state: &mut TrainerState, text: &str, reply: Reply<MoveReport>, events: &Events) {
    let Some(puzzle) = state.puzzle.as_mut() else {
        let _ = reply.send(Err(TrainerError::NoActivePuzzle));
        return;
    };
    match state.phase {
        Phase::AwaitingPlayerMove if puzzle.player_to_move() => {}
        Phase::Complete { .. } => {
            let _ = reply.send(Err(TrainerError::PuzzleFinished));
            return;
        }
        _ => {
            let _ = reply.send(Err(TrainerError::Busy));
            return;
        }
    }

    let mv = match parse_player_move(&puzzle.game, text) {
        Ok(mv) => mv,
        Err(e) => {
            let _ = reply.send(Err(e));
            return;
        }
    };
    let before = puzzle.game.position().clone();
    let entry = match puzzle.game.make_move(mv) {
        Ok(entry) => entry,
        Err(_) => {
            let _ = reply.send(Err(TrainerError::InvalidMove(text.to_string())));
            return;
        }
    };
    tracing::debug!(san = %entry.san, "Move submitted");

    let verifier = MoveVerifier::new(state.gateway.clone());
    let settings = state.scorekeeper.settings();
    let (depth, lines) = (settings.depth, settings.multipv);
    let epoch = puzzle.epoch;
    spawn_work(puzzle.token.clone(), state.work_tx.clone(), async move {
        Work::Verified {
            epoch,
            verdict: verifier.verify(&before, mv, depth, lines).await,
        }
    });
    puzzle.pending = Some(PendingMove {
        san: entry.san,
        reply,
    });
    state.phase = Phase::Verifying;
    state.message = None;
    publish(state, events);
}

fn on_verified(state: &mut TrainerState, epoch: u64, verdict: Verdict, events: &Events) {
    if state.phase != Phase::Verifying {
        return;
    }
    let Some(puzzle) = state.puzzle.as_mut().filter(|p| p.epoch == epoch) else {
        return;
    };
    let Some(pending) = puzzle.pending.take() else {
        return;
    };
    if !verdict.is_correct() {
        let _ = puzzle.game.undo();
    }
    let finished = puzzle.game.is_game_over() || puzzle.line_exhausted();

    let _ = events.send(TrainerEvent::MoveVerified {
        san: pending.san.clone(),
        verdict: verdict.clone(),
    });

    let completed = match &verdict {
        Verdict::Unverifiable { reason } => {
            state.phase = Phase::AwaitingPlayerMove;
            state.message = Some(reason.user_message());
            None
        }
        Verdict::Incorrect { swing } => {
            state.phase = Phase::AwaitingPlayerMove;
            on_incorrect(state, *swing, events);
            None
        }
        Verdict::Correct { swing, .. } => {
            state.message = Some(format!("Correct! {}", pending.san));
            if finished {
                complete_puzzle(state, true, *swing, true, events);
                Some(true)
            } else {
                state.phase = Phase::AwaitingOpponentReply;
                spawn_opponent_move(
                    state,
                    Duration::from_millis(state.config.pacing.opponent_reply_ms),
                );
                None
            }
        }
    };

    let _ = pending.reply.send(Ok(MoveReport {
        san: pending.san,
        verdict,
        completed,
    }));
    publish(state, events);
}

fn on_incorrect(state: &mut TrainerState, swing: i32, events: &Events) {
    match state.mode_kind() {
        None => {}
        Some(ModeKind::Rush) => {
            let Some(ModeSession::Rush(rush)) = state.mode.as_mut().map(|m| &mut m.session)
            else {
                return;
            };
            rush.record_strike();
            let ended = rush.end_reason().is_some();
            state.message = Some(format!(
                "Strike {} of {}. Try again.",
                rush.strikes, rush.max_strikes
            ));
            if ended {
                finish_mode(state, events, false);
            }
        }
        Some(ModeKind::Battle) => {
            state.message = Some("Not the best move. Keep trying.".to_string());
        }
        Some(_) => {
            state.message = Some("Not the best move. Try again.".to_string());
            record_attempt(state, false, swing, events);
        }
    }
}

/// Log a result against the rating. Only the first failure of a puzzle
/// counts; once failed, a later solve is practice.
fn record_attempt(
    state: &mut TrainerState,
    solved: bool,
    swing: i32,
    events: &Events,
) -> Option<ScoreChange> {
    let puzzle = state.puzzle.as_mut()?;
    if puzzle.failure_recorded {
        return None;
    }
    if !solved {
        puzzle.failure_recorded = true;
    }
    let outcome = PuzzleOutcome {
        puzzle_id: puzzle.puzzle.id.clone(),
        solved,
        swing,
    };
    let (change, saved) = state.scorekeeper.record(&outcome);
    if let Err(e) = saved {
        let _ = events.send(TrainerEvent::Error(e.user_message()));
    }
    Some(change)
}

#[derive(Clone, Copy)]
enum AfterPuzzle {
    Record,
    Advance(Duration),
    EndMode,
}

/// Close the current puzzle. An unscored completion leaves rating, rush
/// points and battle score untouched.
fn complete_puzzle(
    state: &mut TrainerState,
    solved: bool,
    swing: i32,
    scored: bool,
    events: &Events,
) {
    let Some(puzzle) = state.puzzle.as_mut() else {
        return;
    };
    puzzle.token.cancel();
    puzzle.abandon_pending(TrainerError::PuzzleFinished);
    puzzle.deadline = None;
    let puzzle_id = puzzle.puzzle.id.clone();
    let epoch = puzzle.epoch;
    state.phase = Phase::Complete { solved };

    let Some(mode) = state.mode.as_mut() else {
        return;
    };
    let mode_token = mode.token.clone();
    let after = match &mut mode.session {
        ModeSession::Standard(_) => AfterPuzzle::Record,
        ModeSession::Rush(rush) => {
            match (scored, solved) {
                (false, _) => {}
                (true, true) => {
                    let points = rush.record_solve(swing);
                    state.message = Some(format!("Solved! +{} points", points));
                }
                (true, false) => rush.record_strike(),
            }
            match rush.end_reason() {
                Some(_) => AfterPuzzle::EndMode,
                None => AfterPuzzle::Advance(Duration::from_millis(state.config.rush.advance_ms)),
            }
        }
        ModeSession::Battle(battle) => {
            if scored && solved {
                battle.score(BattleSide::Player);
                state.message = Some("You solved it first!".to_string());
            }
            match battle.winner() {
                Some(_) => AfterPuzzle::EndMode,
                None => {
                    AfterPuzzle::Advance(Duration::from_millis(state.config.battle.advance_ms))
                }
            }
        }
    };

    let change = match after {
        AfterPuzzle::Record if scored => record_attempt(state, solved, swing, events),
        _ => None,
    };
    tracing::info!(puzzle = %puzzle_id, solved, "Puzzle complete");
    let _ = events.send(TrainerEvent::PuzzleCompleted {
        puzzle_id,
        solved,
        change,
    });

    match after {
        AfterPuzzle::Record => {}
        AfterPuzzle::Advance(delay) => {
            spawn_work(mode_token, state.work_tx.clone(), async move {
                time::sleep(delay).await;
                Work::Advance { epoch }
            });
        }
        AfterPuzzle::EndMode => {
            finish_mode(state, events, false);
        }
    }
}

fn on_opponent_move(
    state: &mut TrainerState,
    epoch: u64,
    played: Result<cozy_chess::Move, TrainerError>,
    events: &Events,
) {
    if !matches!(
        state.phase,
        Phase::PuzzleLoaded | Phase::AwaitingOpponentReply
    ) {
        return;
    }
    let Some(puzzle) = state.puzzle.as_mut().filter(|p| p.epoch == epoch) else {
        return;
    };
    let entry = played.and_then(|mv| {
        let mv = convert_uci_castling_to_cozy(mv, &puzzle.game.legal_moves());
        puzzle
            .game
            .make_move(mv)
            .map_err(|e| TrainerError::Internal(format!("engine move rejected: {}", e)))
    });

    match entry {
        Ok(entry) => {
            puzzle.stalled = false;
            let game_over = puzzle.game.is_game_over();
            let in_check = puzzle.game.in_check();
            // The opening move is the engine's alone; the player has not played yet.
            let opening = state.phase == Phase::PuzzleLoaded;
            let _ = events.send(TrainerEvent::OpponentMoved { san: entry.san });
            if game_over {
                state.message = Some("Puzzle complete!".to_string());
                complete_puzzle(state, true, 0, !opening, events);
            } else {
                state.phase = Phase::AwaitingPlayerMove;
                state.message = Some(if in_check {
                    "Your turn. King in check!".to_string()
                } else {
                    "Your turn. Find the next move.".to_string()
                });
            }
        }
        Err(e) => {
            tracing::warn!("Opponent move failed: {}", e);
            puzzle.stalled = true;
            state.message = Some(e.user_message());
            let _ = events.send(TrainerEvent::Error(e.user_message()));
        }
    }
    publish(state, events);
}

/// Retry an opponent move that failed while the engine was away.
fn resume_stalled(state: &mut TrainerState) {
    let waiting = matches!(
        state.phase,
        Phase::PuzzleLoaded | Phase::AwaitingOpponentReply
    );
    let Some(puzzle) = state.puzzle.as_mut().filter(|p| p.stalled && waiting) else {
        return;
    };
    puzzle.stalled = false;
    spawn_opponent_move(state, Duration::ZERO);
}

fn on_timeout(state: &mut TrainerState, epoch: u64, events: &Events) {
    if state.phase.is_complete() {
        return;
    }
    let Some(puzzle) = state.puzzle.as_mut().filter(|p| p.epoch == epoch) else {
        return;
    };
    if puzzle.pending.is_some() {
        let _ = puzzle.game.undo();
    }
    tracing::info!(puzzle = %puzzle.puzzle.id, "Solve timer expired");
    state.message = Some("Out of time. This puzzle counts as failed.".to_string());
    complete_puzzle(state, false, TIMEOUT_SWING, true, events);
    publish(state, events);
}

fn on_rush_tick(state: &mut TrainerState, epoch: u64, events: &Events) {
    let Some(mode) = state.mode.as_mut().filter(|m| m.epoch == epoch) else {
        return;
    };
    let ModeSession::Rush(rush) = &mut mode.session else {
        return;
    };
    rush.tick();
    if rush.end_reason().is_some() {
        finish_mode(state, events, false);
    }
    publish(state, events);
}

fn on_opponent_attempt(state: &mut TrainerState, epoch: u64, events: &Events) {
    if state.phase.is_complete() {
        return;
    }
    let Some(puzzle) = state.puzzle.as_mut().filter(|p| p.epoch == epoch) else {
        return;
    };
    let accuracy = state
        .config
        .battle
        .accuracy
        .accuracy(puzzle.puzzle.rating)
        .clamp(0.0, 1.0);
    if !state.rng.gen_bool(accuracy) {
        tracing::debug!(accuracy, "Battle opponent missed");
        return;
    }

    puzzle.token.cancel();
    if puzzle.pending.is_some() {
        let _ = puzzle.game.undo();
    }
    puzzle.abandon_pending(TrainerError::PuzzleFinished);
    puzzle.deadline = None;
    let puzzle_id = puzzle.puzzle.id.clone();

    let Some(mode) = state.mode.as_mut() else {
        return;
    };
    let ModeSession::Battle(battle) = &mut mode.session else {
        return;
    };
    battle.score(BattleSide::Opponent);
    let decided = battle.winner().is_some();
    let mode_token = mode.token.clone();

    tracing::info!(puzzle = %puzzle_id, "Battle opponent solved first");
    state.phase = Phase::Complete { solved: false };
    state.message = Some("Your opponent solved it first.".to_string());
    let _ = events.send(TrainerEvent::OpponentSolved { puzzle_id });

    if decided {
        finish_mode(state, events, false);
    } else {
        let delay = Duration::from_millis(state.config.battle.advance_ms);
        spawn_work(mode_token, state.work_tx.clone(), async move {
            time::sleep(delay).await;
            Work::Advance { epoch }
        });
    }
    publish(state, events);
}

fn request_hint(state: &TrainerState, reply: Reply<Vec<HintLine>>) {
    let puzzle = match player_turn(state) {
        Ok(puzzle) => puzzle,
        Err(e) => {
            let _ = reply.send(Err(e));
            return;
        }
    };
    let board = puzzle.game.position().clone();
    let gateway = state.gateway.clone();
    let settings = state.scorekeeper.settings();
    let (depth, lines) = (settings.depth, settings.multipv);
    let token = puzzle.token.clone();

    tokio::spawn(async move {
        let fen = board.to_string();
        let result: Result<Vec<HintLine>, TrainerError> = tokio::select! {
            biased;
            _ = token.cancelled() => Err(TrainerError::PuzzleFinished),
            found = gateway.request_eval(&fen, depth, lines) => found
                .map_err(TrainerError::from)
                .map(|found| {
                    found
                        .into_iter()
                        .map(|line| HintLine {
                            rank: line.rank,
                            score: line.score.display(),
                            moves: format_line_san(&board, &line.pv),
                        })
                        .collect()
                }),
        };
        let _ = reply.send(result);
    });
}

fn stored_solution(state: &TrainerState) -> Result<Vec<String>, TrainerError> {
    if let Some(kind) = state.mode_kind().filter(|k| k.is_competitive()) {
        return Err(TrainerError::NotAllowedInMode(kind.name()));
    }
    let puzzle = state.puzzle.as_ref().ok_or(TrainerError::NoActivePuzzle)?;
    let line = solution_uci(&puzzle.start_fen, &puzzle.puzzle.best);
    if line.is_empty() {
        return Err(TrainerError::NoSolution(puzzle.puzzle.id.clone()));
    }
    Ok(line)
}

/// The active puzzle, if it is the player's turn in a mode that allows help.
fn player_turn(state: &TrainerState) -> Result<&ActivePuzzle, TrainerError> {
    if let Some(kind) = state.mode_kind().filter(|k| k.is_competitive()) {
        return Err(TrainerError::NotAllowedInMode(kind.name()));
    }
    let puzzle = state.puzzle.as_ref().ok_or(TrainerError::NoActivePuzzle)?;
    match state.phase {
        Phase::AwaitingPlayerMove => Ok(puzzle),
        Phase::Complete { .. } => Err(TrainerError::PuzzleFinished),
        _ => Err(TrainerError::Busy),
    }
}

/// Tear down the active mode, cancelling everything it started.
fn finish_mode(state: &mut TrainerState, events: &Events, stopped: bool) -> Option<ModeSummary> {
    let mode = state.mode.take()?;
    mode.token.cancel();
    if let Some(mut puzzle) = state.puzzle.take() {
        puzzle.abandon_pending(TrainerError::NoActivePuzzle);
    }
    state.phase = Phase::Idle;

    let summary = mode.session.summary(stopped);
    tracing::info!(mode = %mode.session.kind(), ?summary, "Mode ended");
    state.message = Some(summary.to_string());
    let _ = events.send(TrainerEvent::ModeEnded(summary.clone()));
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccuracyCurve, BattleConfig, RushConfig, TrainerConfig};
    use crate::library::{GameLibrary, PuzzlePool};
    use crate::modes::RushEnd;
    use crate::persistence::Settings;
    use crate::puzzle::{Puzzle, PuzzleSource};
    use crate::scoring::tests::MemoryRepository;
    use crate::session::{spawn_trainer, TrainerContext, TrainerHandle};
    use engine::mock::{MockEngine, MockLine};
    use engine::GatewayConfig;
    use std::sync::Arc;

    const BACK_RANK: &str = "6k1/5ppp/8/8/8/8/5PPP/Q5K1 w - - 0 1";
    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    fn fen_puzzle(id: &str, fen: &str, side: PieceColor, best: &[&str]) -> Puzzle {
        Puzzle {
            id: id.to_string(),
            name: None,
            source: PuzzleSource::Fen(fen.to_string()),
            side,
            rating: 1200,
            themes: vec!["mate".to_string()],
            best: best.iter().map(|m| m.to_string()).collect(),
            hint: None,
        }
    }

    fn back_rank() -> Puzzle {
        fen_puzzle("back-rank", BACK_RANK, PieceColor::White, &["Qa8#"])
    }

    fn opening() -> Puzzle {
        fen_puzzle("opening", START, PieceColor::White, &[])
    }

    fn back_rank_engine() -> MockEngine {
        MockEngine::new().with_lines(BACK_RANK, vec![MockLine::mate(1, &["a1a8"])])
    }

    fn opening_engine() -> MockEngine {
        MockEngine::new()
            .with_lines(START, vec![MockLine::cp(30, &["e2e4"])])
            .with_lines(AFTER_E4, vec![MockLine::cp(-30, &["c7c5"])])
    }

    fn white_player() -> TrainerConfig {
        TrainerConfig {
            player_color: Some(PieceColor::White),
            seed: Some(7),
            ..Default::default()
        }
    }

    async fn gateway(mock: MockEngine) -> EngineGateway {
        EngineGateway::start_with_io(mock.spawn(), GatewayConfig::default())
            .await
            .unwrap()
    }

    async fn spawn_test_trainer(
        puzzles: Vec<Puzzle>,
        engine: Option<MockEngine>,
        config: TrainerConfig,
    ) -> (
        TrainerHandle,
        broadcast::Receiver<TrainerEvent>,
        MemoryRepository,
    ) {
        let gateway = match engine {
            Some(mock) => gateway(mock).await,
            None => EngineGateway::disconnected(),
        };
        let repo = MemoryRepository::default();
        let handle = spawn_trainer(TrainerContext {
            config,
            library: Arc::new(GameLibrary::default()),
            pool: Arc::new(PuzzlePool::new(puzzles)),
            gateway,
            store: Box::new(repo.clone()),
        });
        let (_, events) = handle.subscribe().await.unwrap();
        (handle, events, repo)
    }

    async fn wait_for<F>(events: &mut broadcast::Receiver<TrainerEvent>, pred: F) -> TrainerEvent
    where
        F: Fn(&TrainerEvent) -> bool,
    {
        time::timeout(Duration::from_secs(600), async {
            loop {
                let event = events.recv().await.expect("event stream closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_mating_move_completes_and_scores() {
        let (handle, _events, repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;

        let snap = handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(snap.mode, Some(ModeKind::Rated));
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert_eq!(snap.player, Some(PieceColor::White));

        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(report.san, "Qa8#");
        assert_eq!(
            report.verdict,
            Verdict::Correct {
                top_tier: true,
                swing: 0
            }
        );
        assert_eq!(report.completed, Some(true));

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete { solved: true });
        assert_eq!(snap.progress.rating, 1210);
        assert_eq!(snap.progress.streak, 1);
        let saved = repo.saved.lock().unwrap().clone().unwrap();
        assert_eq!(saved.puzzle.rating, 1210);

        assert_eq!(
            handle.submit_move("a1a8").await,
            Err(TrainerError::PuzzleFinished)
        );
    }

    #[tokio::test]
    async fn test_incorrect_move_reverts_and_counts_once() {
        let (handle, _events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();

        let report = handle.submit_move("h3").await.unwrap();
        assert!(matches!(report.verdict, Verdict::Incorrect { .. }));
        assert_eq!(report.completed, None);

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert!(snap.moves.is_empty());
        assert_eq!(snap.side_to_move, Some(PieceColor::White));
        assert_eq!(snap.progress.rating, 1188);
        assert_eq!(snap.progress.streak, 0);
        assert_eq!(snap.progress.attempts, 1);

        handle.submit_move("h2h3").await.unwrap();
        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(report.completed, Some(true));

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.progress.rating, 1188);
        assert_eq!(snap.progress.attempts, 1);
    }

    #[tokio::test]
    async fn test_illegal_and_early_moves_rejected() {
        let (handle, _events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        assert_eq!(
            handle.submit_move("Qa8#").await,
            Err(TrainerError::NoActivePuzzle)
        );

        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert!(matches!(
            handle.submit_move("a1h8").await,
            Err(TrainerError::InvalidMove(_))
        ));
        assert!(matches!(
            handle.submit_move("Nf3").await,
            Err(TrainerError::InvalidMove(_))
        ));
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert_eq!(snap.progress.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opponent_replies_after_correct_move() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![opening()], Some(opening_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Custom, PuzzleFilter::default())
            .await
            .unwrap();

        let report = handle.submit_move("e4").await.unwrap();
        assert!(report.verdict.is_correct());
        assert_eq!(report.completed, None);
        assert_eq!(
            handle.submit_move("d4").await,
            Err(TrainerError::Busy)
        );

        let event = wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::OpponentMoved { .. })
        })
        .await;
        assert!(matches!(event, TrainerEvent::OpponentMoved { san } if san == "c5"));

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert_eq!(snap.moves, vec!["e4", "c5"]);
        assert_eq!(snap.side_to_move, Some(PieceColor::White));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_opens_when_player_holds_other_side() {
        let config = TrainerConfig {
            player_color: Some(PieceColor::Black),
            ..Default::default()
        };
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![opening()], Some(opening_engine()), config).await;

        let snap = handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(snap.phase, Phase::PuzzleLoaded);
        assert_eq!(snap.player, Some(PieceColor::Black));
        assert_eq!(handle.submit_move("e2e4").await, Err(TrainerError::Busy));

        wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::OpponentMoved { san } if san == "e4")
        })
        .await;
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert_eq!(snap.side_to_move, Some(PieceColor::Black));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_mate_completes_without_scoring() {
        let config = TrainerConfig {
            player_color: Some(PieceColor::Black),
            ..Default::default()
        };
        let (handle, mut events, repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), config).await;
        let snap = handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(snap.phase, Phase::PuzzleLoaded);

        let event = wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::PuzzleCompleted { .. })
        })
        .await;
        let TrainerEvent::PuzzleCompleted { solved, change, .. } = event else {
            unreachable!();
        };
        assert!(solved);
        assert_eq!(change, None);

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete { solved: true });
        assert_eq!(snap.moves, vec!["Qa8#"]);
        assert_eq!(snap.progress.rating, 1200);
        assert_eq!(snap.progress.streak, 0);
        assert_eq!(snap.progress.attempts, 0);
        assert!(repo.saved.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mating_reply_after_player_move_counts_as_solved() {
        const ROOK_MATE: &str = "6k1/1p3ppp/8/8/8/8/6PP/R6K b - - 0 1";
        const AFTER_B6: &str = "6k1/5ppp/1p6/8/8/8/6PP/R6K w - - 0 2";
        let engine = MockEngine::new()
            .with_lines(ROOK_MATE, vec![MockLine::cp(-300, &["b7b6"])])
            .with_lines(AFTER_B6, vec![MockLine::mate(1, &["a1a8"])]);
        let config = TrainerConfig {
            player_color: Some(PieceColor::Black),
            ..Default::default()
        };
        let puzzle = fen_puzzle("rook-mate", ROOK_MATE, PieceColor::Black, &[]);
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![puzzle], Some(engine), config).await;
        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();

        let report = handle.submit_move("b6").await.unwrap();
        assert!(report.verdict.is_correct());
        assert_eq!(report.completed, None);

        let event = wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::PuzzleCompleted { .. })
        })
        .await;
        let TrainerEvent::PuzzleCompleted { solved, change, .. } = event else {
            unreachable!();
        };
        assert!(solved);
        assert_eq!(change.map(|c| c.rating), Some(1210));

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.moves, vec!["b6", "Ra8#"]);
        assert_eq!(snap.progress.streak, 1);
        assert_eq!(snap.progress.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_move_while_verifying_is_busy() {
        let engine = back_rank_engine().with_search_delay(Duration::from_secs(2));
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(engine), white_player()).await;
        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit_move("Qa8#").await }
        });
        wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::StateChanged(s) if s.phase == Phase::Verifying)
        })
        .await;
        assert_eq!(handle.submit_move("a1a8").await, Err(TrainerError::Busy));

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.completed, Some(true));
    }

    #[tokio::test]
    async fn test_stopped_engine_leaves_move_unjudged() {
        let (handle, _events, _repo) =
            spawn_test_trainer(vec![back_rank()], None, TrainerConfig::default()).await;
        let snap = handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        // No engine to play the other side, so the player takes the side to move.
        assert_eq!(snap.player, Some(PieceColor::White));
        assert!(!snap.engine_ready);

        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(
            report.verdict,
            Verdict::Unverifiable {
                reason: TrainerError::EngineNotReady
            }
        );
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert!(snap.moves.is_empty());
        assert_eq!(snap.progress.attempts, 0);
        assert_eq!(
            snap.message.as_deref(),
            Some("Engine stopped. Start it to continue.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_reply_resumes_on_new_engine() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![opening()], Some(opening_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        handle.submit_move("e4").await.unwrap();
        handle.stop_engine().await.unwrap();

        wait_for(&mut events, |e| matches!(e, TrainerEvent::Error(_))).await;
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingOpponentReply);
        assert!(!snap.engine_ready);

        handle
            .attach_engine(gateway(opening_engine()).await)
            .await
            .unwrap();
        wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::OpponentMoved { san } if san == "c5")
        })
        .await;
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
    }

    #[tokio::test]
    async fn test_rush_ends_on_third_strike() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Rush, PuzzleFilter::default())
            .await
            .unwrap();

        for strikes in 1..=2u8 {
            handle.submit_move("h3").await.unwrap();
            let snap = handle.get_snapshot().await.unwrap();
            assert_eq!(snap.rush.map(|r| r.strikes), Some(strikes));
        }
        handle.submit_move("h3").await.unwrap();

        let event = wait_for(&mut events, |e| matches!(e, TrainerEvent::ModeEnded(_))).await;
        assert!(matches!(
            event,
            TrainerEvent::ModeEnded(ModeSummary::Rush {
                strikes: 3,
                reason: RushEnd::Strikes,
                ..
            })
        ));
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.mode, None);
        assert_eq!(snap.phase, Phase::Idle);
        // Rush never touches the rating.
        assert_eq!(snap.progress.rating, 1200);
        assert_eq!(snap.progress.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rush_ends_when_clock_runs_out() {
        let config = TrainerConfig {
            rush: RushConfig {
                duration_secs: 3,
                ..Default::default()
            },
            ..white_player()
        };
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), config).await;
        let snap = handle
            .start_mode(ModeKind::Rush, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(snap.rush.map(|r| r.remaining_secs), Some(3));
        assert_eq!(
            handle.hint().await,
            Err(TrainerError::NotAllowedInMode("rush"))
        );
        assert_eq!(
            handle.next_puzzle().await.map(|s| s.mode),
            Err(TrainerError::NotAllowedInMode("rush"))
        );

        let event = wait_for(&mut events, |e| matches!(e, TrainerEvent::ModeEnded(_))).await;
        assert!(matches!(
            event,
            TrainerEvent::ModeEnded(ModeSummary::Rush {
                reason: RushEnd::TimeUp,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rush_solve_scores_and_advances() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Rush, PuzzleFilter::default())
            .await
            .unwrap();

        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(report.completed, Some(true));
        let snap = handle.get_snapshot().await.unwrap();
        let rush = snap.rush.unwrap();
        assert_eq!((rush.score, rush.solved), (10, 1));

        wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::PuzzleCompleted { .. })
        })
        .await;
        wait_for(&mut events, |e| matches!(e, TrainerEvent::PuzzleLoaded { .. })).await;
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::AwaitingPlayerMove);
        assert!(snap.moves.is_empty());
        assert_eq!(snap.mode, Some(ModeKind::Rush));
    }

    fn battle_config(delay_ms: u64, target_score: u32) -> TrainerConfig {
        TrainerConfig {
            battle: BattleConfig {
                target_score,
                opponent_min_delay_ms: delay_ms,
                opponent_max_delay_ms: delay_ms,
                accuracy: AccuracyCurve {
                    min: 1.0,
                    max: 1.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..white_player()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_battle_opponent_reaches_target() {
        let (handle, mut events, _repo) = spawn_test_trainer(
            vec![back_rank()],
            Some(back_rank_engine()),
            battle_config(100, 1),
        )
        .await;
        handle
            .start_mode(ModeKind::Battle, PuzzleFilter::default())
            .await
            .unwrap();

        wait_for(&mut events, |e| matches!(e, TrainerEvent::OpponentSolved { .. })).await;
        let event = wait_for(&mut events, |e| matches!(e, TrainerEvent::ModeEnded(_))).await;
        assert!(matches!(
            event,
            TrainerEvent::ModeEnded(ModeSummary::Battle {
                player_score: 0,
                opponent_score: 1,
                winner: Some(BattleSide::Opponent),
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_battle_player_solve_cancels_opponent() {
        let (handle, mut events, _repo) = spawn_test_trainer(
            vec![back_rank()],
            Some(back_rank_engine()),
            battle_config(60_000, 2),
        )
        .await;
        handle
            .start_mode(ModeKind::Battle, PuzzleFilter::default())
            .await
            .unwrap();

        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(report.completed, Some(true));
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.battle.map(|b| b.player_score), Some(1));

        // The next puzzle loads before the first opponent timer would fire.
        wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::PuzzleCompleted { .. })
        })
        .await;
        wait_for(&mut events, |e| matches!(e, TrainerEvent::PuzzleLoaded { .. })).await;
        let report = handle.submit_move("Qa8#").await.unwrap();
        assert_eq!(report.completed, Some(true));

        let event = wait_for(&mut events, |e| matches!(e, TrainerEvent::ModeEnded(_))).await;
        assert!(matches!(
            event,
            TrainerEvent::ModeEnded(ModeSummary::Battle {
                player_score: 2,
                opponent_score: 0,
                winner: Some(BattleSide::Player),
            })
        ));

        time::sleep(Duration::from_secs(120)).await;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, TrainerEvent::OpponentSolved { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_solve_timer_fails_puzzle() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        handle
            .update_settings(Settings {
                timer_enabled: true,
                timer_seconds: 10,
                ..Settings::default()
            })
            .await
            .unwrap();
        let snap = handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(snap.timer_remaining_secs, Some(10));

        let event = wait_for(&mut events, |e| {
            matches!(e, TrainerEvent::PuzzleCompleted { .. })
        })
        .await;
        let TrainerEvent::PuzzleCompleted { solved, change, .. } = event else {
            unreachable!();
        };
        assert!(!solved);
        assert_eq!(change.map(|c| c.rating), Some(1188));

        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::Complete { solved: false });
        assert_eq!(snap.timer_remaining_secs, None);
    }

    #[tokio::test]
    async fn test_broken_puzzles_are_skipped() {
        let broken = fen_puzzle("broken", BACK_RANK, PieceColor::Black, &[]);
        let (handle, _events, _repo) = spawn_test_trainer(
            vec![broken.clone(), back_rank()],
            None,
            TrainerConfig::default(),
        )
        .await;

        for _ in 0..3 {
            let snap = match handle.next_puzzle().await {
                Ok(snap) => snap,
                Err(_) => handle
                    .start_mode(ModeKind::Rated, PuzzleFilter::default())
                    .await
                    .unwrap(),
            };
            assert_eq!(snap.puzzle.map(|p| p.id), Some("back-rank".to_string()));
        }

        let (handle, _events, _repo) =
            spawn_test_trainer(vec![broken], None, TrainerConfig::default()).await;
        assert_eq!(
            handle
                .start_mode(ModeKind::Daily, PuzzleFilter::default())
                .await
                .map(|s| s.mode),
            Err(TrainerError::NoPuzzles)
        );
        assert_eq!(handle.get_snapshot().await.unwrap().mode, None);
    }

    #[tokio::test]
    async fn test_hint_and_solution() {
        let (handle, _events, _repo) =
            spawn_test_trainer(vec![back_rank()], Some(back_rank_engine()), white_player()).await;
        handle
            .start_mode(ModeKind::Daily, PuzzleFilter::default())
            .await
            .unwrap();

        let hint = handle.hint().await.unwrap();
        assert_eq!(hint.len(), 1);
        assert_eq!(hint[0].rank, 1);
        assert_eq!(hint[0].score, "+M1");
        assert_eq!(hint[0].moves, vec!["Qa8#"]);
        assert_eq!(handle.solution().await.unwrap(), vec!["a1a8"]);

        // Neither counts as an attempt.
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.progress.attempts, 0);
    }

    #[tokio::test]
    async fn test_solution_missing() {
        let (handle, _events, _repo) =
            spawn_test_trainer(vec![opening()], None, white_player()).await;
        handle
            .start_mode(ModeKind::Rated, PuzzleFilter::default())
            .await
            .unwrap();
        assert_eq!(
            handle.solution().await,
            Err(TrainerError::NoSolution("opening".to_string()))
        );
    }

    #[tokio::test]
    async fn test_end_mode_reports_summary() {
        let (handle, mut events, _repo) =
            spawn_test_trainer(vec![back_rank()], None, TrainerConfig::default()).await;
        assert_eq!(handle.end_mode().await, Err(TrainerError::NoActivePuzzle));

        handle
            .start_mode(ModeKind::Custom, PuzzleFilter::default())
            .await
            .unwrap();
        let summary = handle.end_mode().await.unwrap();
        assert_eq!(
            summary,
            ModeSummary::Standard {
                kind: ModeKind::Custom
            }
        );
        wait_for(&mut events, |e| matches!(e, TrainerEvent::ModeEnded(_))).await;
        let snap = handle.get_snapshot().await.unwrap();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.puzzle.is_none());
    }
}
