//! Puzzle trainer built on a UCI engine.
//!
//! Puzzles start from a stored FEN or from a ply of a bundled source game.
//! The player's moves are judged against engine evaluations instead of a
//! single stored answer, the engine plays the other side, and results feed
//! a persistent rating. Five modes share one state machine: rated, custom,
//! daily, rush and battle.

pub mod config;
pub mod error;
pub mod library;
pub mod modes;
pub mod persistence;
pub mod puzzle;
pub mod resolver;
pub mod scoring;
pub mod session;
pub mod verifier;

pub use error::TrainerError;
pub use modes::{ModeKind, ModeSummary};
pub use session::{spawn_trainer, TrainerContext, TrainerEvent, TrainerHandle, TrainerSnapshot};
