//! Turns a puzzle into its starting position.

use crate::error::TrainerError;
use crate::library::GameLibrary;
use crate::puzzle::{Puzzle, PuzzleSource};
use chess::{parse_pgn, Game, GameError, PieceColor};
use std::sync::Arc;

/// A puzzle's starting position, ready to play on.
#[derive(Debug, Clone)]
pub struct ResolvedPosition {
    pub fen: String,
    pub game: Game,
}

impl ResolvedPosition {
    pub fn side_to_move(&self) -> PieceColor {
        self.game.side_to_move().into()
    }
}

#[derive(Debug, Clone)]
pub struct PositionResolver {
    library: Arc<GameLibrary>,
}

impl PositionResolver {
    pub fn new(library: Arc<GameLibrary>) -> Self {
        Self { library }
    }

    /// Resolve `puzzle` and check that the declared side is to move.
    ///
    /// A direct FEN is returned as given. A game reference replays the
    /// game's first `ply - 1` half-moves.
    pub fn resolve(&self, puzzle: &Puzzle) -> Result<ResolvedPosition, TrainerError> {
        let resolved = match &puzzle.source {
            PuzzleSource::Fen(fen) => ResolvedPosition {
                fen: fen.clone(),
                game: Game::from_fen(fen)
                    .map_err(|e| TrainerError::InvalidPosition(e.to_string()))?,
            },
            PuzzleSource::Game { game_id, ply } => self.replay(game_id, *ply)?,
        };

        let actual = resolved.side_to_move();
        if actual != puzzle.side {
            return Err(TrainerError::UnresolvablePosition {
                puzzle: puzzle.id.clone(),
                expected: puzzle.side,
                actual,
            });
        }
        Ok(resolved)
    }

    fn replay(&self, game_id: &str, ply: usize) -> Result<ResolvedPosition, TrainerError> {
        let source = self
            .library
            .get(game_id)
            .ok_or_else(|| TrainerError::SourceGameNotFound(game_id.to_string()))?;
        let pgn = parse_pgn(&source.pgn)
            .map_err(|e| TrainerError::InvalidPosition(format!("{}: {}", game_id, e)))?;

        let out_of_range = || TrainerError::PlyOutOfRange {
            game_id: game_id.to_string(),
            ply,
            available: pgn.moves.len(),
        };
        if ply == 0 {
            return Err(out_of_range());
        }

        let game = Game::from_pgn_prefix(&pgn, ply - 1).map_err(|e| match e {
            GameError::NotEnoughMoves { .. } => out_of_range(),
            other => TrainerError::InvalidPosition(format!("{}: {}", game_id, other)),
        })?;
        tracing::debug!(game_id, ply, "Replayed source game");
        Ok(ResolvedPosition {
            fen: game.to_fen(),
            game,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PuzzlePool;
    use crate::puzzle::SourceGame;

    fn bundled_resolver() -> PositionResolver {
        PositionResolver::new(Arc::new(GameLibrary::bundled().unwrap()))
    }

    fn game_puzzle(game_id: &str, ply: usize, side: PieceColor) -> Puzzle {
        Puzzle {
            id: format!("{}-{}", game_id, ply),
            name: None,
            source: PuzzleSource::Game {
                game_id: game_id.to_string(),
                ply,
            },
            side,
            rating: 1200,
            themes: Vec::new(),
            best: Vec::new(),
            hint: None,
        }
    }

    #[test]
    fn test_fen_passes_through_unchanged() {
        let fen = "6k1/5ppp/8/8/8/8/5PPP/Q5K1 w - - 0 1";
        let puzzle = Puzzle {
            source: PuzzleSource::Fen(fen.to_string()),
            ..game_puzzle("unused", 1, PieceColor::White)
        };
        let resolved = bundled_resolver().resolve(&puzzle).unwrap();
        assert_eq!(resolved.fen, fen);
    }

    #[test]
    fn test_replay_stops_before_ply() {
        // Ply 4 of the fool's mate is 2...Qh4#.
        let resolved = bundled_resolver()
            .resolve(&game_puzzle("fools-mate", 4, PieceColor::Black))
            .unwrap();
        assert_eq!(resolved.game.history().len(), 3);
        assert!(resolved
            .fen
            .starts_with("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq"));
        assert_eq!(resolved.side_to_move(), PieceColor::Black);
    }

    #[test]
    fn test_ply_one_is_the_initial_position() {
        let resolved = bundled_resolver()
            .resolve(&game_puzzle("opera-1858", 1, PieceColor::White))
            .unwrap();
        assert!(resolved.game.history().is_empty());
    }

    #[test]
    fn test_ply_past_end_of_game() {
        let resolver = bundled_resolver();
        // Four plies: position after the last one is ply 5.
        assert!(resolver
            .resolve(&game_puzzle("fools-mate", 5, PieceColor::White))
            .is_ok());
        assert_eq!(
            resolver
                .resolve(&game_puzzle("fools-mate", 6, PieceColor::Black))
                .unwrap_err(),
            TrainerError::PlyOutOfRange {
                game_id: "fools-mate".to_string(),
                ply: 6,
                available: 4,
            }
        );
        assert!(matches!(
            resolver.resolve(&game_puzzle("fools-mate", 0, PieceColor::White)),
            Err(TrainerError::PlyOutOfRange { ply: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_game() {
        assert_eq!(
            bundled_resolver()
                .resolve(&game_puzzle("lost-game", 3, PieceColor::White))
                .unwrap_err(),
            TrainerError::SourceGameNotFound("lost-game".to_string())
        );
    }

    #[test]
    fn test_wrong_side_is_unresolvable() {
        let err = bundled_resolver()
            .resolve(&game_puzzle("scholars-mate", 7, PieceColor::Black))
            .unwrap_err();
        assert!(matches!(
            err,
            TrainerError::UnresolvablePosition {
                expected: PieceColor::Black,
                actual: PieceColor::White,
                ..
            }
        ));
    }

    #[test]
    fn test_unparseable_game_is_invalid_position() {
        let library = GameLibrary::from_games(vec![SourceGame {
            id: "bad".to_string(),
            name: String::new(),
            pgn: "1.e4 e5 2.Ke3 Nc6".to_string(),
        }]);
        let resolver = PositionResolver::new(Arc::new(library));
        assert!(matches!(
            resolver.resolve(&game_puzzle("bad", 2, PieceColor::Black)),
            Err(TrainerError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_resolving_twice_is_identical() {
        let resolver = bundled_resolver();
        let puzzle = game_puzzle("immortal-1851", 43, PieceColor::White);
        let a = resolver.resolve(&puzzle).unwrap();
        let b = resolver.resolve(&puzzle).unwrap();
        assert_eq!(a.fen, b.fen);
    }

    #[test]
    fn test_replaying_prefix_reproduces_resolved_position() {
        let resolver = bundled_resolver();
        let resolved = resolver
            .resolve(&game_puzzle("evergreen-1852", 10, PieceColor::Black))
            .unwrap();

        let source = GameLibrary::bundled().unwrap();
        let pgn = parse_pgn(&source.get("evergreen-1852").unwrap().pgn).unwrap();
        let mut game = Game::new();
        for pgn_move in &pgn.moves[..9] {
            game.play_san(&pgn_move.san).unwrap();
        }
        assert_eq!(game.to_fen(), resolved.fen);
        assert_eq!(PieceColor::from(game.side_to_move()), PieceColor::Black);
    }

    #[test]
    fn test_every_bundled_puzzle_resolves() {
        let resolver = bundled_resolver();
        for puzzle in PuzzlePool::bundled().unwrap().iter() {
            let resolved = resolver.resolve(puzzle);
            assert!(resolved.is_ok(), "{}: {:?}", puzzle.id, resolved.err());
            let mut game = resolved.unwrap().game;
            for step in &puzzle.best {
                assert!(
                    game.play_san(step).is_ok(),
                    "{}: solution step {} is not legal",
                    puzzle.id,
                    step
                );
            }
        }
    }
}
