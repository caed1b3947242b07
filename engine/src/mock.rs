//! Scripted in-process UCI engine.
//!
//! Speaks enough UCI for the gateway: handshake, `MultiPV`, `position fen`,
//! `go depth`, `stop` and `quit`. Positions are matched on piece placement
//! and side to move. Unscripted positions answer with their legal moves at a
//! flat score of 0, or `bestmove (none)` when there are none.

use crate::EngineIo;
use chess::{convert_cozy_castling_to_uci, format_uci_move, AnalysisScore};
use cozy_chess::{Board, Move};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted line: score from the side to move and a PV in UCI text.
#[derive(Debug, Clone)]
pub struct MockLine {
    pub score: AnalysisScore,
    pub pv: Vec<String>,
}

impl MockLine {
    pub fn cp(cp: i32, pv: &[&str]) -> Self {
        Self {
            score: AnalysisScore::Centipawns(cp),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn mate(moves: i32, pv: &[&str]) -> Self {
        Self {
            score: AnalysisScore::Mate(moves),
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum Script {
    Lines(Vec<MockLine>),
    Raw(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    scripts: HashMap<String, Script>,
    silent: bool,
    search_delay: Option<Duration>,
    log: Arc<Mutex<Vec<String>>>,
}

fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

fn score_text(score: AnalysisScore) -> String {
    match score {
        AnalysisScore::Centipawns(cp) => format!("cp {}", cp),
        AnalysisScore::Mate(m) => format!("mate {}", m),
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer searches of `fen` with these lines, best first.
    pub fn with_lines(mut self, fen: &str, lines: Vec<MockLine>) -> Self {
        self.scripts.insert(position_key(fen), Script::Lines(lines));
        self
    }

    /// Answer searches of `fen` with verbatim output lines (include the `bestmove`).
    pub fn with_raw(mut self, fen: &str, lines: &[&str]) -> Self {
        self.scripts.insert(
            position_key(fen),
            Script::Raw(lines.iter().map(|l| l.to_string()).collect()),
        );
        self
    }

    /// Never answer anything.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Hold each search open this long (or until `stop`).
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    /// Every command the engine has received, in order.
    pub fn command_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.log.clone()
    }

    pub fn spawn(self) -> EngineIo {
        let (cmd_tx, cmd_rx) = mpsc::channel::<String>(64);
        let (out_tx, out_rx) = mpsc::channel::<String>(256);
        tokio::spawn(self.run(cmd_rx, out_tx));
        EngineIo {
            tx: cmd_tx,
            rx: out_rx,
        }
    }

    fn record(&self, cmd: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push(cmd.to_string());
        }
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<String>, out_tx: mpsc::Sender<String>) {
        let mut multipv: u8 = 1;
        let mut fen = String::new();

        while let Some(cmd) = cmd_rx.recv().await {
            self.record(&cmd);
            if self.silent {
                continue;
            }
            let mut tokens = cmd.split_whitespace();
            let replies: Vec<String> = match tokens.next() {
                Some("uci") => vec!["id name MockFish".into(), "uciok".into()],
                Some("isready") => vec!["readyok".into()],
                Some("setoption") => {
                    if let Some(value) = cmd.strip_prefix("setoption name MultiPV value ") {
                        multipv = value.trim().parse().unwrap_or(1);
                    }
                    Vec::new()
                }
                Some("position") => {
                    fen = cmd
                        .strip_prefix("position fen ")
                        .unwrap_or_default()
                        .to_string();
                    Vec::new()
                }
                Some("go") => {
                    let depth: u8 = tokens
                        .skip_while(|t| *t != "depth")
                        .nth(1)
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(1);
                    let (preliminary, final_lines) = self.search_output(&fen, depth, multipv);
                    for line in preliminary {
                        if out_tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    if let Some(delay) = self.search_delay {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            cmd = cmd_rx.recv() => match cmd {
                                Some(cmd) => {
                                    self.record(&cmd);
                                    let bestmove = final_lines
                                        .iter()
                                        .find(|l| l.starts_with("bestmove"))
                                        .cloned()
                                        .unwrap_or_else(|| "bestmove (none)".to_string());
                                    if out_tx.send(bestmove).await.is_err() {
                                        return;
                                    }
                                    if cmd == "quit" {
                                        return;
                                    }
                                    continue;
                                }
                                None => return,
                            },
                        }
                    }
                    final_lines
                }
                Some("quit") => return,
                _ => Vec::new(),
            };

            for line in replies {
                if out_tx.send(line).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Preliminary shallow lines plus the final lines ending in `bestmove`.
    fn search_output(&self, fen: &str, depth: u8, multipv: u8) -> (Vec<String>, Vec<String>) {
        let lines = match self.scripts.get(&position_key(fen)) {
            Some(Script::Raw(raw)) => return (Vec::new(), raw.clone()),
            Some(Script::Lines(lines)) => lines.clone(),
            None => default_lines(fen),
        };

        let shown = lines.iter().take(usize::from(multipv)).enumerate();
        let preliminary: Vec<String> = shown
            .clone()
            .map(|(i, line)| {
                format!(
                    "info depth 1 multipv {} score cp -999 pv {}",
                    i + 1,
                    line.pv.join(" ")
                )
            })
            .collect();

        let mut output: Vec<String> = shown
            .map(|(i, line)| {
                format!(
                    "info depth {} seldepth {} multipv {} score {} nodes 1000 pv {}",
                    depth,
                    depth,
                    i + 1,
                    score_text(line.score),
                    line.pv.join(" ")
                )
            })
            .collect();

        match lines.first().and_then(|l| l.pv.first()) {
            Some(best) => output.push(format!("bestmove {}", best)),
            None => {
                output.push("info depth 0 score mate 0".to_string());
                output.push("bestmove (none)".to_string());
            }
        }
        (preliminary, output)
    }
}

fn default_lines(fen: &str) -> Vec<MockLine> {
    let Ok(board) = fen.parse::<Board>() else {
        return Vec::new();
    };
    let mut moves: Vec<Move> = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
        .into_iter()
        .map(|mv| MockLine {
            score: AnalysisScore::Centipawns(0),
            pv: vec![format_uci_move(convert_cozy_castling_to_uci(&board, mv))],
        })
        .collect()
}
