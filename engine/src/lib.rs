pub mod gateway;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod stockfish;
pub mod uci;

pub use gateway::{EngineGateway, EvaluationLine, GatewayConfig};
pub use stockfish::{find_stockfish_path, StockfishConfig, StockfishProcess};
pub use uci::{UciError, UciMessage};

use chess::AnalysisScore;
use cozy_chess::Move;
use tokio::sync::mpsc;

/// Line-oriented duplex channel to a UCI engine.
///
/// `tx` carries commands to the engine (without trailing newline), `rx`
/// carries the engine's output lines. A real process and the scripted mock
/// both present themselves this way.
pub struct EngineIo {
    pub tx: mpsc::Sender<String>,
    pub rx: mpsc::Receiver<String>,
}

/// Engine analysis information from one `info` line
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<AnalysisScore>,
    /// Set when the score is a `lowerbound` / `upperbound` rather than exact.
    pub bound: bool,
    pub pv: Vec<Move>,
    pub multipv: Option<u8>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine is not running")]
    NotReady,
    #[error("Engine did not become ready within {0} ms")]
    Timeout(u64),
    #[error("Stockfish executable not found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(String),
    #[error("Engine I/O error: {0}")]
    Io(String),
    #[error("Evaluation cancelled")]
    Cancelled,
    #[error("Engine protocol error: {0}")]
    Protocol(String),
}
