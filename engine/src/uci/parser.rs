use std::str::FromStr;

use super::UciError;
use crate::EngineInfo;
use chess::{parse_uci_move, AnalysisScore};
use cozy_chess::Move;

/// A line from the engine the gateway cares about.
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    /// `mv` is `None` for `bestmove (none)`, sent when the side to move has no legal moves.
    BestMove { mv: Option<Move>, ponder: Option<Move> },
    Info(EngineInfo),
}

/// Parse one line of engine output.
pub fn parse_uci_message(line: &str) -> Result<UciMessage, UciError> {
    let malformed = || UciError::MalformedMessage(line.to_string());
    let mut tokens = line.split_whitespace();

    match tokens.next() {
        Some("uciok") => Ok(UciMessage::UciOk),
        Some("readyok") => Ok(UciMessage::ReadyOk),
        Some("id") => {
            let name = tokens.next().ok_or_else(malformed)?.to_string();
            let value = tokens.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err(malformed());
            }
            Ok(UciMessage::Id { name, value })
        }
        Some("bestmove") => {
            let mv = match tokens.next().ok_or_else(malformed)? {
                "(none)" | "0000" => None,
                text => Some(parse_uci_move(text)?),
            };
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(text)) => parse_uci_move(text).ok(),
                _ => None,
            };
            Ok(UciMessage::BestMove { mv, ponder })
        }
        Some("info") => Ok(UciMessage::Info(parse_info_fields(tokens))),
        _ => Err(UciError::UnknownMessage(line.to_string())),
    }
}

fn number<'a, T: FromStr>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<T> {
    tokens.next().and_then(|t| t.parse().ok())
}

/// Fields of an `info` line. Unknown keys are skipped; `string` ends the line.
fn parse_info_fields<'a>(tokens: impl Iterator<Item = &'a str>) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut tokens = tokens.peekable();

    while let Some(key) = tokens.next() {
        match key {
            "depth" => info.depth = number(&mut tokens),
            "seldepth" => info.seldepth = number(&mut tokens),
            "time" => info.time_ms = number(&mut tokens),
            "nodes" => info.nodes = number(&mut tokens),
            "nps" => info.nps = number(&mut tokens),
            "multipv" => info.multipv = number(&mut tokens),
            "hashfull" => info.hashfull = number(&mut tokens),
            "score" => {
                let kind = tokens.next();
                info.score = match (kind, number::<i32>(&mut tokens)) {
                    (Some("cp"), Some(cp)) => Some(AnalysisScore::Centipawns(cp)),
                    (Some("mate"), Some(n)) => Some(AnalysisScore::Mate(n)),
                    _ => None,
                };
            }
            "lowerbound" | "upperbound" => info.bound = true,
            "pv" => {
                while let Some(text) = tokens.next_if(|t| !is_info_key(t)) {
                    if let Ok(mv) = parse_uci_move(text) {
                        info.pv.push(mv);
                    }
                }
            }
            "string" => break,
            _ => {}
        }
    }

    info
}

fn is_info_key(token: &str) -> bool {
    const KEYS: &[&str] = &[
        "depth",
        "seldepth",
        "time",
        "nodes",
        "nps",
        "score",
        "pv",
        "multipv",
        "currmove",
        "currmovenumber",
        "hashfull",
        "tbhits",
        "cpuload",
        "string",
    ];
    KEYS.contains(&token)
}
