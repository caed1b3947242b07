use cozy_chess::{Board, Move};
use std::collections::HashMap;

use super::san::{format_san, parse_san, SanError};

/// A parsed PGN game with every move validated against the rules.
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    pub moves: Vec<PgnMove>,
    pub result: GameResult,
}

/// A single replayed move. `san` is the canonical form, not the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnMove {
    pub mv: Move,
    pub san: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Ongoing,
}

impl PgnGame {
    /// Starting board: the `FEN` tag when present, the standard position otherwise.
    pub fn start_board(&self) -> Result<Board, PgnError> {
        match self.tags.get("FEN") {
            Some(fen) => crate::fen::parse_fen(fen).map_err(|_| PgnError::InvalidTag(fen.clone())),
            None => Ok(Board::default()),
        }
    }
}

enum Token {
    Tag(String, String),
    Word(String),
}

/// Split PGN text into tag pairs and movetext words, dropping comments,
/// variations, and numeric annotation glyphs.
fn tokenize(input: &str) -> Result<Vec<Token>, PgnError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut word = String::new();

    fn flush(word: &mut String, tokens: &mut Vec<Token>) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                flush(&mut word, &mut tokens);
                let mut raw = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => raw.push(ch),
                        None => return Err(PgnError::InvalidTag(raw)),
                    }
                }
                tokens.push(parse_tag(&raw)?);
            }
            '{' => {
                flush(&mut word, &mut tokens);
                if !chars.by_ref().any(|ch| ch == '}') {
                    return Err(PgnError::UnterminatedComment);
                }
            }
            ';' => {
                flush(&mut word, &mut tokens);
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut word, &mut tokens);
                let mut depth = 1usize;
                while depth > 0 {
                    match chars.next() {
                        Some('(') => depth += 1,
                        Some(')') => depth -= 1,
                        Some(_) => {}
                        None => return Err(PgnError::UnterminatedVariation),
                    }
                }
            }
            '$' => {
                flush(&mut word, &mut tokens);
                while chars.peek().is_some_and(|ch| ch.is_ascii_digit()) {
                    chars.next();
                }
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

fn parse_tag(raw: &str) -> Result<Token, PgnError> {
    let raw = raw.trim();
    let (key, rest) = raw
        .split_once(char::is_whitespace)
        .ok_or_else(|| PgnError::InvalidTag(raw.to_string()))?;
    let value = rest
        .trim()
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or_else(|| PgnError::InvalidTag(raw.to_string()))?;
    Ok(Token::Tag(key.to_string(), value.replace("\\\"", "\"")))
}

fn parse_result(word: &str) -> Option<GameResult> {
    match word {
        "1-0" => Some(GameResult::WhiteWins),
        "0-1" => Some(GameResult::BlackWins),
        "1/2-1/2" => Some(GameResult::Draw),
        "*" => Some(GameResult::Ongoing),
        _ => None,
    }
}

/// Strip a leading move number (`12.` / `12...`) from a movetext word.
fn strip_move_number(word: &str) -> &str {
    if word.starts_with("0-0") {
        return word;
    }
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == word.len() {
        return word;
    }
    rest.trim_start_matches('.')
}

/// Parse a PGN string into a game.
///
/// Movetext is replayed from the start position (or the `FEN` tag), so every
/// returned move is legal in sequence.
pub fn parse_pgn(input: &str) -> Result<PgnGame, PgnError> {
    let mut tags = HashMap::new();
    let mut sans = Vec::new();
    let mut result = GameResult::Ongoing;

    for token in tokenize(input)? {
        match token {
            Token::Tag(key, value) => {
                tags.insert(key, value);
            }
            Token::Word(word) => {
                if let Some(r) = parse_result(&word) {
                    result = r;
                    continue;
                }
                let san = strip_move_number(&word);
                if !san.is_empty() {
                    sans.push(san.to_string());
                }
            }
        }
    }

    let mut game = PgnGame {
        tags,
        moves: Vec::with_capacity(sans.len()),
        result,
    };
    let mut board = game.start_board()?;
    for (index, san) in sans.iter().enumerate() {
        let mv = parse_san(&board, san).map_err(|source| PgnError::IllegalMove {
            ply: index as u32 + 1,
            source,
        })?;
        let canonical = format_san(&board, mv);
        board.play_unchecked(mv);
        game.moves.push(PgnMove { mv, san: canonical });
    }
    Ok(game)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PgnError {
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Unterminated comment")]
    UnterminatedComment,
    #[error("Unterminated variation")]
    UnterminatedVariation,
    #[error("Illegal move at ply {ply}: {source}")]
    IllegalMove { ply: u32, source: SanError },
}
