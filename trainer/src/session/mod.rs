//! The puzzle/mode state machine as a single actor task.
//!
//! [`spawn_trainer`] wires the collaborators together and returns a
//! [`TrainerHandle`]. Engine searches, pacing delays, the rush clock and the
//! battle opponent run as child tasks that report back to the actor; each is
//! tied to a cancellation token for its puzzle or mode.

mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub mod snapshot;
pub mod state;

use std::sync::Arc;

use engine::EngineGateway;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc};

use crate::config::TrainerConfig;
use crate::library::{GameLibrary, PuzzlePool};
use crate::persistence::StateRepository;
use crate::resolver::PositionResolver;
use crate::scoring::Scorekeeper;
use actor::run_trainer_actor;
pub use commands::{HintLine, MoveReport};
pub use events::TrainerEvent;
pub use handle::TrainerHandle;
pub use snapshot::{ProgressView, PuzzleView, TrainerSnapshot};
pub use state::Phase;
use state::TrainerState;

/// Everything the trainer needs, built by the caller.
pub struct TrainerContext {
    pub config: TrainerConfig,
    pub library: Arc<GameLibrary>,
    pub pool: Arc<PuzzlePool>,
    /// May be [`EngineGateway::disconnected`]; attach one later.
    pub gateway: EngineGateway,
    pub store: Box<dyn StateRepository>,
}

/// Spawn the trainer actor. Must be called inside a tokio runtime.
pub fn spawn_trainer(ctx: TrainerContext) -> TrainerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (work_tx, work_rx) = mpsc::channel(64);
    let (event_tx, _) = broadcast::channel(100);

    let rng = match ctx.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let scorekeeper = Scorekeeper::open(ctx.store);
    let state = TrainerState::new(
        ctx.config,
        ctx.pool,
        PositionResolver::new(ctx.library),
        ctx.gateway,
        scorekeeper,
        rng,
        work_tx,
    );

    tokio::spawn(run_trainer_actor(state, cmd_rx, work_rx, event_tx));
    TrainerHandle::new(cmd_tx)
}
