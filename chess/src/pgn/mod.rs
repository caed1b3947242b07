//! PGN movetext and SAN.

mod parser;
mod san;

pub use parser::{parse_pgn, GameResult, PgnError, PgnGame, PgnMove};
pub use san::{format_line_san, format_san, parse_san, SanError};
