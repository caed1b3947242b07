//! Chess rules glue for the trainer.
//!
//! Board state and move legality come from `cozy-chess`; this crate adds the
//! notation layers the trainer needs (FEN, SAN, PGN movetext, UCI move text)
//! and a small `Game` wrapper with history and undo.

pub mod analysis;
pub mod converters;
pub mod fen;
pub mod game;
pub mod pgn;
pub mod types;
pub mod uci;

pub use analysis::{AnalysisScore, MATE_CP};
pub use converters::*;
pub use fen::FenError;
pub use game::{Game, GameError, GameOutcome, HistoryEntry};
pub use pgn::{
    format_line_san, format_san, parse_pgn, parse_san, PgnError, PgnGame, SanError,
};
pub use types::PieceColor;
pub use uci::{
    convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, format_uci_move, parse_uci_move,
    UciMoveError,
};
