use cozy_chess::{Board, Color, GameStatus, Move, Piece};

use crate::fen::{format_fen, parse_fen};
use crate::pgn::{format_san, parse_san, PgnGame, SanError};
use crate::types::PieceColor;
use crate::uci::{convert_uci_castling_to_cozy, parse_uci_move, UciMoveError};

/// A board plus the moves that led to it.
///
/// `earlier[i]` is the position before `history[i]`, so undo is a pop.
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    earlier: Vec<Board>,
    history: Vec<HistoryEntry>,
}

/// A move as it was played.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub mv: Move,
    pub piece: Piece,
    pub piece_color: Color,
    pub captured: Option<Piece>,
    pub san: String,
    /// Position after the move.
    pub fen: String,
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Checkmate { winner: PieceColor },
    Draw,
}

impl Game {
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(position: Board) -> Self {
        Self {
            position,
            earlier: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        Ok(Self::from_board(parse_fen(fen)?))
    }

    /// Replay the first `plies` moves of a parsed PGN game.
    pub fn from_pgn_prefix(pgn: &PgnGame, plies: usize) -> Result<Self, GameError> {
        if plies > pgn.moves.len() {
            return Err(GameError::NotEnoughMoves {
                requested: plies,
                available: pgn.moves.len(),
            });
        }
        let mut game = match pgn.tags.get("FEN") {
            Some(fen) => Self::from_fen(fen)?,
            None => Self::new(),
        };
        for pgn_move in &pgn.moves[..plies] {
            game.make_move(pgn_move.mv)?;
        }
        Ok(game)
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Play `mv` (board encoding) if it is legal here.
    pub fn make_move(&mut self, mv: Move) -> Result<HistoryEntry, GameError> {
        if !self.position.is_legal(mv) {
            return Err(GameError::IllegalMove);
        }
        let (Some(piece), Some(piece_color)) =
            (self.position.piece_on(mv.from), self.position.color_on(mv.from))
        else {
            return Err(GameError::IllegalMove);
        };
        // Castling lands on the king's own rook; that is not a capture.
        let captured = match self.position.color_on(mv.to) {
            Some(color) if color != piece_color => self.position.piece_on(mv.to),
            _ => None,
        };

        let san = format_san(&self.position, mv);
        let before = self.position.clone();
        self.position.play_unchecked(mv);
        self.earlier.push(before);

        let entry = HistoryEntry {
            mv,
            piece,
            piece_color,
            captured,
            san,
            fen: self.to_fen(),
        };
        self.history.push(entry.clone());
        Ok(entry)
    }

    /// Parse and play a SAN move.
    pub fn play_san(&mut self, san: &str) -> Result<HistoryEntry, GameError> {
        let mv = parse_san(&self.position, san)?;
        self.make_move(mv)
    }

    /// Parse and play a UCI move. `e1g1` castling is accepted.
    pub fn play_uci(&mut self, text: &str) -> Result<HistoryEntry, GameError> {
        let mv = self.resolve_uci(text)?;
        self.make_move(mv)
    }

    /// Turn UCI text into a move in this board's encoding.
    pub fn resolve_uci(&self, text: &str) -> Result<Move, GameError> {
        let mv = parse_uci_move(text)?;
        Ok(convert_uci_castling_to_cozy(mv, &self.legal_moves()))
    }

    /// Take back the last move.
    pub fn undo(&mut self) -> Result<(), GameError> {
        let previous = self.earlier.pop().ok_or(GameError::NothingToUndo)?;
        self.history.pop();
        self.position = previous;
        Ok(())
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.position.generate_moves(|piece_moves| {
            moves.extend(piece_moves);
            false
        });
        moves
    }

    pub fn status(&self) -> GameStatus {
        self.position.status()
    }

    pub fn is_game_over(&self) -> bool {
        self.status() != GameStatus::Ongoing
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        match self.status() {
            GameStatus::Ongoing => None,
            GameStatus::Drawn => Some(GameOutcome::Draw),
            GameStatus::Won => Some(GameOutcome::Checkmate {
                winner: PieceColor::from(self.side_to_move()).opposite(),
            }),
        }
    }

    pub fn in_check(&self) -> bool {
        !self.position.checkers().is_empty()
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    pub fn to_fen(&self) -> String {
        format_fen(&self.position)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Requested {requested} plies but the game has {available}")]
    NotEnoughMoves { requested: usize, available: usize },
    #[error("Bad FEN: {0}")]
    FenError(#[from] crate::fen::FenError),
    #[error("SAN error: {0}")]
    San(#[from] SanError),
    #[error("UCI move error: {0}")]
    Uci(#[from] UciMoveError),
}
