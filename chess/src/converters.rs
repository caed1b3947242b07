//! Conversions between cozy-chess primitives and their text forms.

use cozy_chess::{File, Piece, Rank, Square};

/// Format a square as algebraic text, e.g. `e4`.
pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_char(sq.file()), rank_char(sq.rank()))
}

/// Parse algebraic square text such as `e4`.
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = parse_file(chars.next()?)?;
    let rank = parse_rank(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some(Square::new(file, rank))
}

pub fn file_char(file: File) -> char {
    char::from(b'a' + file as u8)
}

pub fn rank_char(rank: Rank) -> char {
    char::from(b'1' + rank as u8)
}

pub fn parse_file(c: char) -> Option<File> {
    let index = u8::try_from(c).ok()?.checked_sub(b'a')?;
    File::ALL.get(usize::from(index)).copied()
}

pub fn parse_rank(c: char) -> Option<Rank> {
    let index = u8::try_from(c).ok()?.checked_sub(b'1')?;
    Rank::ALL.get(usize::from(index)).copied()
}

/// Lowercase piece letter as used in UCI promotions and FEN for black.
pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Uppercase SAN piece letter. Pawns have no letter in SAN.
pub fn san_piece_letter(piece: Piece) -> Option<char> {
    match piece {
        Piece::Pawn => None,
        other => Some(format_piece(other).to_ascii_uppercase()),
    }
}

/// Parse a piece letter in either case.
pub fn parse_piece(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'p' => Some(Piece::Pawn),
        'n' => Some(Piece::Knight),
        'b' => Some(Piece::Bishop),
        'r' => Some(Piece::Rook),
        'q' => Some(Piece::Queen),
        'k' => Some(Piece::King),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_text() {
        let sq = Square::new(File::E, Rank::Fourth);
        assert_eq!(format_square(sq), "e4");
        assert_eq!(parse_square("e4"), Some(sq));
        assert_eq!(parse_square("e9"), None);
        assert_eq!(parse_square("e44"), None);
        assert_eq!(parse_square(""), None);
        assert_eq!(parse_file('A'), None);
        assert_eq!(rank_char(Rank::Eighth), '8');
    }

    #[test]
    fn test_piece_letters() {
        assert_eq!(format_piece(Piece::Knight), 'n');
        assert_eq!(san_piece_letter(Piece::Knight), Some('N'));
        assert_eq!(san_piece_letter(Piece::Pawn), None);
        assert_eq!(parse_piece('Q'), Some(Piece::Queen));
        assert_eq!(parse_piece('x'), None);
    }
}
