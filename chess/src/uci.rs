//! UCI move text.

use cozy_chess::{File, Move, Rank, Square};

use crate::converters::{format_piece, format_square, parse_piece, parse_square};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid square in move: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion piece in move: {0}")]
    InvalidPromotion(String),
}

/// Parse UCI move text (`e2e4`, `e7e8q`).
///
/// Castling comes back in UCI form (`e1g1`); run it through
/// [`convert_uci_castling_to_cozy`] before playing it on a board.
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
        return Err(UciMoveError::InvalidSquare(s.to_string()));
    }
    let from = parse_square(&s[0..2]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let to = parse_square(&s[2..4]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let promotion = match s[4..].chars().next() {
        Some(c) => Some(parse_piece(c).ok_or_else(|| UciMoveError::InvalidPromotion(s.to_string()))?),
        None => None,
    };
    Ok(Move {
        from,
        to,
        promotion,
    })
}

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// Only converts when the king-to-rook form is present in `legal_moves`, so
/// ordinary king moves to g/c files pass through untouched.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_back_rank && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let rook_file = if mv.to.file() == File::G {
            File::H
        } else {
            File::A
        };
        let converted = Move {
            from: mv.from,
            to: Square::new(rook_file, mv.from.rank()),
            promotion: None,
        };
        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// Inverse of [`convert_uci_castling_to_cozy`]: given a legal cozy move on
/// `board`, return the form a UCI engine expects.
pub fn convert_cozy_castling_to_uci(board: &cozy_chess::Board, mv: Move) -> Move {
    let side = board.side_to_move();
    let is_castle = board.piece_on(mv.from) == Some(cozy_chess::Piece::King)
        && board.color_on(mv.to) == Some(side);
    if !is_castle {
        return mv;
    }
    let king_file = if mv.to.file() > mv.from.file() {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(king_file, mv.from.rank()),
        promotion: None,
    }
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}
