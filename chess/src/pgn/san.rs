//! Standard Algebraic Notation over cozy-chess boards.
//!
//! Castling follows cozy-chess's king-captures-rook encoding: `O-O` parses to
//! the king moving onto its own rook, and such a move formats back as `O-O`.

use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::converters::{
    file_char, format_square, parse_file, parse_piece, parse_rank, parse_square, rank_char,
    san_piece_letter,
};
use crate::uci::convert_uci_castling_to_cozy;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanError {
    #[error("Empty move text")]
    Empty,
    #[error("Malformed move text: {0}")]
    Malformed(String),
    #[error("No legal move matches {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move {0}")]
    Ambiguous(String),
}

fn legal_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::new();
    board.generate_moves(|mvs| {
        moves.extend(mvs);
        false
    });
    moves
}

fn is_castle(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move())
}

/// Parse a SAN move in the context of `board`.
///
/// Accepts check/mate suffixes and `!?` annotations, `0-0` as well as `O-O`,
/// and promotions written `e8=Q` or `e8Q`.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let text = san.trim().trim_end_matches(&['+', '#', '!', '?'][..]);
    if text.is_empty() {
        return Err(SanError::Empty);
    }
    let legal = legal_moves(board);

    let castle = match text {
        "O-O" | "0-0" => Some(true),
        "O-O-O" | "0-0-0" => Some(false),
        _ => None,
    };
    if let Some(kingside) = castle {
        return legal
            .into_iter()
            .find(|mv| is_castle(board, *mv) && (mv.to.file() > mv.from.file()) == kingside)
            .ok_or_else(|| SanError::NoLegalMove(san.to_string()));
    }

    let mut body: Vec<char> = text.chars().filter(|c| *c != 'x' && *c != '-').collect();

    let promotion = match body.as_slice() {
        [.., '=', p] => {
            let piece = parse_piece(*p).ok_or_else(|| SanError::Malformed(san.to_string()))?;
            body.truncate(body.len() - 2);
            Some(piece)
        }
        [.., r, p] if r.is_ascii_digit() && p.is_ascii_uppercase() => {
            let piece = parse_piece(*p).ok_or_else(|| SanError::Malformed(san.to_string()))?;
            body.truncate(body.len() - 1);
            Some(piece)
        }
        _ => None,
    };

    let piece = match body.first() {
        Some(c) if c.is_ascii_uppercase() => {
            let piece = parse_piece(*c).ok_or_else(|| SanError::Malformed(san.to_string()))?;
            body.remove(0);
            piece
        }
        _ => Piece::Pawn,
    };

    if body.len() < 2 {
        return Err(SanError::Malformed(san.to_string()));
    }
    let dest_text: String = body[body.len() - 2..].iter().collect();
    let dest = parse_square(&dest_text).ok_or_else(|| SanError::Malformed(san.to_string()))?;

    let mut from_file = None;
    let mut from_rank = None;
    for c in &body[..body.len() - 2] {
        if let Some(f) = parse_file(*c) {
            from_file = Some(f);
        } else if let Some(r) = parse_rank(*c) {
            from_rank = Some(r);
        } else {
            return Err(SanError::Malformed(san.to_string()));
        }
    }

    let mut candidates = legal.into_iter().filter(|mv| {
        mv.to == dest
            && mv.promotion == promotion
            && board.piece_on(mv.from) == Some(piece)
            && !is_castle(board, *mv)
            && from_file.map_or(true, |f| mv.from.file() == f)
            && from_rank.map_or(true, |r| mv.from.rank() == r)
    });

    match (candidates.next(), candidates.next()) {
        (Some(mv), None) => Ok(mv),
        (Some(_), Some(_)) => Err(SanError::Ambiguous(san.to_string())),
        (None, _) => Err(SanError::NoLegalMove(san.to_string())),
    }
}

/// Format a legal move on `board` as SAN, including check and mate suffixes.
pub fn format_san(board: &Board, mv: Move) -> String {
    let mut san = String::new();

    if is_castle(board, mv) {
        san.push_str(if mv.to.file() > mv.from.file() {
            "O-O"
        } else {
            "O-O-O"
        });
    } else {
        let piece = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
        let is_capture = board.piece_on(mv.to).is_some()
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        match san_piece_letter(piece) {
            Some(letter) => {
                san.push(letter);
                san.push_str(&disambiguation(board, mv, piece));
            }
            None if is_capture => san.push(file_char(mv.from.file())),
            None => {}
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion.and_then(san_piece_letter) {
            san.push('=');
            san.push(promo);
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.status() == GameStatus::Won {
        san.push('#');
    } else if !after.checkers().is_empty() {
        san.push('+');
    }
    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let rivals: Vec<Move> = legal_moves(board)
        .into_iter()
        .filter(|other| {
            other.to == mv.to
                && other.from != mv.from
                && board.piece_on(other.from) == Some(piece)
        })
        .collect();

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|o| o.from.file() != mv.from.file()) {
        return file_char(mv.from.file()).to_string();
    }
    if rivals.iter().all(|o| o.from.rank() != mv.from.rank()) {
        return rank_char(mv.from.rank()).to_string();
    }
    format_square(mv.from)
}

/// SAN for an engine line (UCI castling encoding) played out from `board`.
///
/// Stops at the first move that is not legal in the position it reaches.
pub fn format_line_san(board: &Board, line: &[Move]) -> Vec<String> {
    let mut board = board.clone();
    let mut sans = Vec::with_capacity(line.len());
    for &mv in line {
        let legal = legal_moves(&board);
        let mv = convert_uci_castling_to_cozy(mv, &legal);
        if !legal.contains(&mv) {
            break;
        }
        sans.push(format_san(&board, mv));
        board.play_unchecked(mv);
    }
    sans
}
