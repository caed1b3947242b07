//! Request/response front end over a single UCI engine.
//!
//! One actor task owns the engine's I/O. Callers get a cloneable
//! [`EngineGateway`] and await evaluations; the actor runs one search at a
//! time and queues the rest in arrival order. Dropping an evaluation future
//! stops its search, and the aborted search's output is drained before the
//! next one starts.

use crate::uci::{parse_uci_message, UciMessage};
use crate::{EngineError, EngineIo, StockfishConfig, StockfishProcess};
use chess::AnalysisScore;
use cozy_chess::Move;
use lru::LruCache;
use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

/// One ranked principal variation from a multi-PV search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationLine {
    /// 1-based rank within its response.
    pub rank: u8,
    /// From the perspective of the side to move in the evaluated position.
    pub score: AnalysisScore,
    /// In UCI encoding (castling as king-two-squares).
    pub pv: Vec<Move>,
    pub depth: u8,
}

impl EvaluationLine {
    pub fn first_move(&self) -> Option<Move> {
        self.pv.first().copied()
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub init_timeout: Duration,
    pub cache_capacity: usize,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub stockfish: StockfishConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(10),
            cache_capacity: 100,
            threads: None,
            hash_mb: None,
            stockfish: StockfishConfig::default(),
        }
    }
}

type EvalReply = oneshot::Sender<Result<Vec<EvaluationLine>, EngineError>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    fen: String,
    depth: u8,
    lines: u8,
}

#[derive(Debug, Clone)]
struct EvalRequest {
    id: u64,
    fen: String,
    depth: u8,
    lines: u8,
}

impl EvalRequest {
    fn cache_key(&self) -> CacheKey {
        CacheKey {
            fen: self.fen.clone(),
            depth: self.depth,
            lines: self.lines,
        }
    }
}

enum GatewayCommand {
    Evaluate {
        request: EvalRequest,
        reply: EvalReply,
    },
    CancelAll {
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the engine gateway actor.
#[derive(Clone)]
pub struct EngineGateway {
    cmd_tx: mpsc::Sender<GatewayCommand>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for EngineGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineGateway")
            .field("running", &self.is_running())
            .finish()
    }
}

impl EngineGateway {
    /// Spawn Stockfish and complete the UCI handshake.
    pub async fn start(config: GatewayConfig) -> Result<Self, EngineError> {
        let (process, io) = StockfishProcess::spawn(&config.stockfish)?;
        Self::launch(io, Some(process), config).await
    }

    /// Run the gateway over an already-connected line channel.
    pub async fn start_with_io(io: EngineIo, config: GatewayConfig) -> Result<Self, EngineError> {
        Self::launch(io, None, config).await
    }

    /// A gateway with no engine behind it. Every request fails with
    /// [`EngineError::NotReady`].
    pub fn disconnected() -> Self {
        let (cmd_tx, _) = mpsc::channel(1);
        Self {
            cmd_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn launch(
        mut io: EngineIo,
        process: Option<StockfishProcess>,
        config: GatewayConfig,
    ) -> Result<Self, EngineError> {
        if let Err(e) = handshake(&mut io, &config).await {
            tracing::error!("Engine handshake failed: {}", e);
            let _ = io.tx.send("quit".to_string()).await;
            if let Some(process) = process {
                process.shutdown().await;
            }
            return Err(e);
        }

        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let state = GatewayState {
            io,
            process,
            queue: VecDeque::new(),
            active: None,
            draining: false,
            cache: LruCache::new(capacity),
        };
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(
            run_gateway_actor(state, cmd_rx).instrument(tracing::info_span!("engine_gateway")),
        );

        tracing::info!("Engine gateway ready");
        Ok(Self {
            cmd_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Evaluate `fen` to `depth`, returning up to `lines` ranked lines.
    ///
    /// Ranks in the result are contiguous from 1. An empty result means the
    /// position has no legal moves.
    pub async fn request_eval(
        &self,
        fen: &str,
        depth: u8,
        lines: u8,
    ) -> Result<Vec<EvaluationLine>, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = EvalRequest {
            id,
            fen: fen.to_string(),
            depth: depth.max(1),
            lines: lines.max(1),
        };
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(GatewayCommand::Evaluate { request, reply })
            .await
            .map_err(|_| EngineError::NotReady)?;
        rx.await.map_err(|_| EngineError::NotReady)?
    }

    /// The engine's preferred move in `fen`, if the position has any.
    pub async fn best_move(&self, fen: &str, depth: u8) -> Result<Option<Move>, EngineError> {
        let lines = self.request_eval(fen, depth, 1).await?;
        Ok(lines.first().and_then(EvaluationLine::first_move))
    }

    /// Fail every queued request with `Cancelled` and stop the running search.
    pub async fn cancel_all(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(GatewayCommand::CancelAll { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Quit the engine. Pending and later requests fail with `NotReady`.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(GatewayCommand::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn handshake(io: &mut EngineIo, config: &GatewayConfig) -> Result<(), EngineError> {
    let timeout_ms = config.init_timeout.as_millis() as u64;
    let exchange = async {
        send_line(&io.tx, "uci".to_string()).await?;
        wait_for(&mut io.rx, |msg| matches!(msg, UciMessage::UciOk)).await?;

        if let Some(threads) = config.threads {
            let threads = threads.clamp(1, 16);
            tracing::info!("Setting Threads to {}", threads);
            send_line(&io.tx, format!("setoption name Threads value {}", threads)).await?;
        }
        if let Some(hash_mb) = config.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            tracing::info!("Setting Hash to {} MB", hash_mb);
            send_line(&io.tx, format!("setoption name Hash value {}", hash_mb)).await?;
        }

        send_line(&io.tx, "isready".to_string()).await?;
        wait_for(&mut io.rx, |msg| matches!(msg, UciMessage::ReadyOk)).await
    };

    tokio::time::timeout(config.init_timeout, exchange)
        .await
        .map_err(|_| EngineError::Timeout(timeout_ms))?
}

async fn send_line(tx: &mpsc::Sender<String>, line: String) -> Result<(), EngineError> {
    tx.send(line)
        .await
        .map_err(|_| EngineError::Io("engine input closed".to_string()))
}

async fn wait_for(
    rx: &mut mpsc::Receiver<String>,
    want: impl Fn(&UciMessage) -> bool,
) -> Result<(), EngineError> {
    while let Some(line) = rx.recv().await {
        if let Ok(msg) = parse_uci_message(&line) {
            if want(&msg) {
                return Ok(());
            }
        }
    }
    Err(EngineError::Io("engine exited during startup".to_string()))
}

struct PendingEval {
    request: EvalRequest,
    reply: EvalReply,
}

struct ActiveSearch {
    request: EvalRequest,
    reply: EvalReply,
    lines: BTreeMap<u8, EvaluationLine>,
}

struct GatewayState {
    io: EngineIo,
    process: Option<StockfishProcess>,
    queue: VecDeque<PendingEval>,
    active: Option<ActiveSearch>,
    /// A `stop` was sent for an abandoned search and its `bestmove` is still due.
    draining: bool,
    cache: LruCache<CacheKey, Vec<EvaluationLine>>,
}

async fn run_gateway_actor(mut state: GatewayState, mut cmd_rx: mpsc::Receiver<GatewayCommand>) {
    loop {
        if state.start_next_search().await.is_err() {
            tracing::error!("Engine input closed");
            state.fail_all(EngineError::NotReady);
            break;
        }

        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(GatewayCommand::Evaluate { request, reply }) => {
                    tracing::debug!(
                        request_id = request.id,
                        depth = request.depth,
                        lines = request.lines,
                        "Evaluation queued"
                    );
                    state.queue.push_back(PendingEval { request, reply });
                }
                Some(GatewayCommand::CancelAll { reply }) => {
                    state.cancel_all().await;
                    let _ = reply.send(());
                }
                Some(GatewayCommand::Stop { reply }) => {
                    state.shutdown().await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    state.shutdown().await;
                    break;
                }
            },
            line = state.io.rx.recv() => match line {
                Some(line) => state.handle_line(&line),
                None => {
                    tracing::warn!("Engine output closed");
                    state.fail_all(EngineError::NotReady);
                    break;
                }
            },
            _ = abandoned(&mut state.active) => state.abandon_active().await,
        }
    }
    tracing::info!("Engine gateway stopped");
}

/// Resolves once the caller awaiting the active search has gone away.
async fn abandoned(active: &mut Option<ActiveSearch>) {
    match active {
        Some(search) => search.reply.closed().await,
        None => std::future::pending().await,
    }
}

impl GatewayState {
    async fn send(&self, line: String) -> Result<(), EngineError> {
        send_line(&self.io.tx, line).await
    }

    async fn start_next_search(&mut self) -> Result<(), EngineError> {
        if self.active.is_some() || self.draining {
            return Ok(());
        }

        while let Some(pending) = self.queue.pop_front() {
            if pending.reply.is_closed() {
                tracing::debug!(request_id = pending.request.id, "Skipping abandoned request");
                continue;
            }
            if let Some(hit) = self.cache.get(&pending.request.cache_key()) {
                tracing::debug!(request_id = pending.request.id, "Evaluation cache hit");
                let _ = pending.reply.send(Ok(hit.clone()));
                continue;
            }

            let request = &pending.request;
            let started = async {
                self.send(format!("setoption name MultiPV value {}", request.lines))
                    .await?;
                self.send(format!("position fen {}", request.fen)).await?;
                self.send(format!("go depth {}", request.depth)).await
            }
            .await;
            if let Err(e) = started {
                let _ = pending.reply.send(Err(EngineError::NotReady));
                return Err(e);
            }

            tracing::debug!(request_id = request.id, fen = %request.fen, "Search started");
            self.active = Some(ActiveSearch {
                request: pending.request,
                reply: pending.reply,
                lines: BTreeMap::new(),
            });
            return Ok(());
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        let msg = match parse_uci_message(line) {
            Ok(msg) => msg,
            Err(_) => {
                tracing::trace!("Ignoring engine output: {}", line);
                return;
            }
        };

        match msg {
            UciMessage::Info(info) => {
                if self.draining {
                    return;
                }
                let Some(search) = self.active.as_mut() else {
                    return;
                };
                let Some(score) = info.score else {
                    return;
                };
                if info.pv.is_empty() || info.bound {
                    return;
                }
                let rank = info.multipv.unwrap_or(1);
                if rank == 0 || rank > search.request.lines {
                    return;
                }
                search.lines.insert(
                    rank,
                    EvaluationLine {
                        rank,
                        score,
                        pv: info.pv,
                        depth: info.depth.unwrap_or(0),
                    },
                );
            }
            UciMessage::BestMove { mv, .. } => {
                if self.draining {
                    tracing::debug!("Drained aborted search");
                    self.draining = false;
                    return;
                }
                let Some(search) = self.active.take() else {
                    tracing::warn!("bestmove with no search in flight");
                    return;
                };
                let lines = contiguous_lines(search.lines, search.request.lines);
                tracing::debug!(
                    request_id = search.request.id,
                    lines = lines.len(),
                    bestmove = ?mv.map(chess::format_uci_move),
                    "Evaluation complete"
                );
                self.cache.put(search.request.cache_key(), lines.clone());
                let _ = search.reply.send(Ok(lines));
            }
            _ => {}
        }
    }

    async fn abandon_active(&mut self) {
        if let Some(search) = self.active.take() {
            tracing::debug!(request_id = search.request.id, "Caller went away, stopping search");
            self.draining = true;
            if self.send("stop".to_string()).await.is_err() {
                self.draining = false;
            }
        }
    }

    async fn cancel_all(&mut self) {
        for pending in self.queue.drain(..) {
            let _ = pending.reply.send(Err(EngineError::Cancelled));
        }
        if let Some(search) = self.active.take() {
            let _ = search.reply.send(Err(EngineError::Cancelled));
            self.draining = true;
            if self.send("stop".to_string()).await.is_err() {
                self.draining = false;
            }
        }
    }

    fn fail_all(&mut self, err: EngineError) {
        if let Some(search) = self.active.take() {
            let _ = search.reply.send(Err(err.clone()));
        }
        for pending in self.queue.drain(..) {
            let _ = pending.reply.send(Err(err.clone()));
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!("Stopping engine");
        let _ = self.send("quit".to_string()).await;
        self.fail_all(EngineError::NotReady);
        if let Some(process) = self.process.take() {
            process.shutdown().await;
        }
    }
}

/// Order by rank and keep the run that starts at rank 1 without gaps.
fn contiguous_lines(lines: BTreeMap<u8, EvaluationLine>, limit: u8) -> Vec<EvaluationLine> {
    lines
        .into_values()
        .enumerate()
        .take_while(|(i, line)| usize::from(line.rank) == i + 1)
        .map(|(_, line)| line)
        .take(usize::from(limit))
        .collect()
}
