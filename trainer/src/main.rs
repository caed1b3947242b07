//! chess-trainer - terminal front end for the puzzle trainer.
//!
//! Reads moves and commands from stdin and prints trainer events. Logs go to
//! a daily file under `<data dir>/logs` so they never interleave with play.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::EngineGateway;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trainer::config::{get_data_dir, TrainerConfig};
use trainer::library::{GameLibrary, PuzzleFilter, PuzzlePool};
use trainer::persistence::{AppState, JsonStore, StateRepository};
use trainer::scoring::Scorekeeper;
use trainer::session::Phase;
use trainer::{
    spawn_trainer, ModeKind, TrainerContext, TrainerError, TrainerEvent, TrainerHandle,
    TrainerSnapshot,
};

const STATE_FILE: &str = "state.json";

#[derive(Parser)]
#[command(name = "chess-trainer", about = "Chess puzzles judged by Stockfish")]
struct Cli {
    /// Where config.json, state.json and logs live.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Stockfish executable. Searched for on common paths when omitted.
    #[arg(long)]
    stockfish: Option<PathBuf>,

    /// Start without an engine. Moves cannot be verified until one is started.
    #[arg(long)]
    no_engine: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve puzzles interactively (the default).
    Play {
        #[arg(long, value_enum, default_value_t = ModeKind::Rated)]
        mode: ModeKind,
        /// Custom mode: only puzzles tagged with this theme.
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        min_rating: Option<u32>,
        #[arg(long)]
        max_rating: Option<u32>,
    },
    /// Print rating, streak and level.
    Stats,
    /// Forget rating and attempt history. Settings are kept.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(get_data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(data_dir.join("logs"), "chess-trainer");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("chess-trainer starting, data dir {}", data_dir.display());

    let config = TrainerConfig::load(&data_dir).context("reading config.json")?;
    let store: Box<dyn StateRepository> =
        Box::new(JsonStore::<AppState>::new(data_dir.join(STATE_FILE)));

    match cli.command {
        Some(Commands::Stats) => {
            print_stats(&Scorekeeper::open(store));
            Ok(())
        }
        Some(Commands::Reset) => {
            let mut scorekeeper = Scorekeeper::open(store);
            scorekeeper.reset_progress()?;
            println!("Progress reset.");
            print_stats(&scorekeeper);
            Ok(())
        }
        Some(Commands::Play {
            mode,
            theme,
            min_rating,
            max_rating,
        }) => {
            let filter = PuzzleFilter {
                theme,
                min_rating,
                max_rating,
            };
            play(&cli.stockfish, cli.no_engine, config, store, mode, filter).await
        }
        None => {
            play(
                &cli.stockfish,
                cli.no_engine,
                config,
                store,
                ModeKind::Rated,
                PuzzleFilter::default(),
            )
            .await
        }
    }
}

fn print_stats(scorekeeper: &Scorekeeper) {
    let progress = scorekeeper.progress();
    println!(
        "Rating {}  Streak {}  Level {}  Solved {}/{}",
        progress.rating,
        progress.streak,
        progress.level,
        progress.solved_count(),
        progress.history.len()
    );
}

async fn start_engine(config: &TrainerConfig, stockfish: Option<PathBuf>) -> EngineGateway {
    match EngineGateway::start(config.gateway_config(stockfish)).await {
        Ok(gateway) => gateway,
        Err(e) => {
            let err = TrainerError::from(e);
            tracing::error!("Engine failed to start: {}", err);
            println!("{}", err.user_message());
            EngineGateway::disconnected()
        }
    }
}

async fn play(
    stockfish: &Option<PathBuf>,
    no_engine: bool,
    config: TrainerConfig,
    store: Box<dyn StateRepository>,
    mode: ModeKind,
    filter: PuzzleFilter,
) -> anyhow::Result<()> {
    let library = Arc::new(GameLibrary::bundled().context("loading bundled games")?);
    let pool = Arc::new(PuzzlePool::bundled().context("loading bundled puzzles")?);
    tracing::info!(
        "Loaded {} puzzles and {} source games",
        pool.len(),
        library.len()
    );

    let gateway = if no_engine {
        EngineGateway::disconnected()
    } else {
        start_engine(&config, stockfish.clone()).await
    };

    let handle = spawn_trainer(TrainerContext {
        config: config.clone(),
        library,
        pool,
        gateway,
        store,
    });

    let (_, events) = handle.subscribe().await?;
    let printer = tokio::spawn(print_events(events));

    println!("Moves as e2e4 or Nf3. Commands: hint, solution, next, status, engine start|stop, end, quit");
    if let Err(e) = handle.start_mode(mode, filter).await {
        println!("{}", e.user_message());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }
        if let Err(e) = run_input(&handle, &config, stockfish, input).await {
            tracing::debug!("Command {:?} failed: {}", input, e);
            println!("{}", e.user_message());
        }
    }

    handle.shutdown().await;
    printer.abort();
    Ok(())
}

async fn run_input(
    handle: &TrainerHandle,
    config: &TrainerConfig,
    stockfish: &Option<PathBuf>,
    input: &str,
) -> Result<(), TrainerError> {
    match input {
        "hint" => {
            for line in handle.hint().await? {
                println!("  {}. {:>6}  {}", line.rank, line.score, line.moves.join(" "));
            }
        }
        "solution" => {
            println!("Solution: {}", handle.solution().await?.join(" "));
        }
        "next" => {
            handle.next_puzzle().await?;
        }
        "status" => print_board(&handle.get_snapshot().await?),
        "end" => {
            handle.end_mode().await?;
        }
        "engine stop" => handle.stop_engine().await?,
        "engine start" => {
            let gateway = start_engine(config, stockfish.clone()).await;
            if gateway.is_running() {
                handle.attach_engine(gateway).await?;
                println!("Engine started.");
            }
        }
        text => {
            handle.submit_move(text).await?;
        }
    }
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<TrainerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Event printer lagged by {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &TrainerEvent) {
    match event {
        TrainerEvent::StateChanged(snapshot) => {
            if matches!(snapshot.phase, Phase::AwaitingPlayerMove) {
                print_board(snapshot);
            }
        }
        TrainerEvent::PuzzleLoaded { puzzle_id, player } => {
            println!("\nPuzzle {} - you play {}", puzzle_id, player);
        }
        TrainerEvent::PuzzleSkipped { puzzle_id, reason } => {
            println!("Skipped puzzle {}: {}", puzzle_id, reason);
        }
        TrainerEvent::MoveVerified { san, verdict } => match verdict.swing() {
            Some(swing) if verdict.is_correct() => println!("{} is correct ({:+})", san, swing),
            Some(swing) => println!("{} is not it ({:+})", san, swing),
            None => println!("{} could not be checked", san),
        },
        TrainerEvent::OpponentMoved { san } => println!("Opponent plays {}", san),
        TrainerEvent::PuzzleCompleted { solved, change, .. } => {
            println!("{}", if *solved { "Solved!" } else { "Failed." });
            if let Some(change) = change.as_ref().filter(|c| c.scored) {
                println!(
                    "Rating {} ({:+})  Streak {}  Level {}{}",
                    change.rating,
                    change.rating_delta(),
                    change.streak,
                    change.level,
                    if change.level_up { "  Level up!" } else { "" }
                );
            }
        }
        TrainerEvent::OpponentSolved { puzzle_id } => {
            println!("Opponent solved {} first.", puzzle_id);
        }
        TrainerEvent::ModeEnded(summary) => println!("{}", summary),
        TrainerEvent::Error(message) => println!("{}", message),
    }
}

fn print_board(snapshot: &TrainerSnapshot) {
    if let Some(puzzle) = &snapshot.puzzle {
        println!("{} ({})", puzzle.name, puzzle.rating);
    }
    if let Some(fen) = &snapshot.fen {
        println!("FEN {}", fen);
    }
    if !snapshot.moves.is_empty() {
        println!("Moves {}", snapshot.moves.join(" "));
    }
    if let Some(rush) = &snapshot.rush {
        println!(
            "Rush {} pts  {} strikes  {}s left",
            rush.score, rush.strikes, rush.remaining_secs
        );
    }
    if let Some(battle) = &snapshot.battle {
        println!(
            "Battle {}-{} (first to {})",
            battle.player_score, battle.opponent_score, battle.target_score
        );
    }
    if let Some(secs) = snapshot.timer_remaining_secs {
        println!("{}s on the clock", secs);
    }
    if let Some(message) = &snapshot.message {
        println!("{}", message);
    }
}
