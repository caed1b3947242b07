use engine::EngineGateway;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::*;
use super::events::TrainerEvent;
use super::snapshot::TrainerSnapshot;
use crate::error::TrainerError;
use crate::library::PuzzleFilter;
use crate::modes::{ModeKind, ModeSummary};
use crate::persistence::Settings;

/// Cheap, cloneable handle to the trainer actor.
#[derive(Clone)]
pub struct TrainerHandle {
    cmd_tx: mpsc::Sender<TrainerCommand>,
}

fn reply_dropped() -> TrainerError {
    TrainerError::Internal("Reply dropped".into())
}

impl TrainerHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<TrainerCommand>) -> Self {
        Self { cmd_tx }
    }

    pub async fn start_mode(
        &self,
        kind: ModeKind,
        filter: PuzzleFilter,
    ) -> Result<TrainerSnapshot, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::StartMode {
            kind,
            filter,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn next_puzzle(&self) -> Result<TrainerSnapshot, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::NextPuzzle { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    /// Resolves once the move has been verified.
    pub async fn submit_move(&self, text: &str) -> Result<MoveReport, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::SubmitMove {
            text: text.to_string(),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn end_mode(&self) -> Result<ModeSummary, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::EndMode { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn hint(&self) -> Result<Vec<HintLine>, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::Hint { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn solution(&self) -> Result<Vec<String>, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::Solution { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::UpdateSettings {
            settings,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    pub async fn reset_progress(&self) -> Result<TrainerSnapshot, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::ResetProgress { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())?
    }

    /// Swap in a running engine. A stalled opponent reply is retried.
    pub async fn attach_engine(&self, gateway: EngineGateway) -> Result<(), TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::AttachEngine { gateway, reply: tx })
            .await?;
        rx.await.map_err(|_| reply_dropped())
    }

    pub async fn stop_engine(&self) -> Result<(), TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::StopEngine { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())
    }

    pub async fn get_snapshot(&self) -> Result<TrainerSnapshot, TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::GetSnapshot { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(TrainerSnapshot, broadcast::Receiver<TrainerEvent>), TrainerError> {
        let (tx, rx) = oneshot::channel();
        self.send(TrainerCommand::Subscribe { reply: tx }).await?;
        rx.await.map_err(|_| reply_dropped())
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(TrainerCommand::Shutdown).await;
    }

    async fn send(&self, cmd: TrainerCommand) -> Result<(), TrainerError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| TrainerError::Internal("Trainer actor closed".into()))
    }
}
