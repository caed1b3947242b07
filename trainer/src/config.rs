//! Configuration for the trainer
//!
//! Data directory precedence:
//! 1. CHESS_TRAINER_DATA_DIR environment variable
//! 2. ~/.config/chess-trainer/data (production default)
//! 3. ./data (fallback for development)
//!
//! Tunables live in an optional `config.json` inside the data directory. Any
//! field left out keeps its default.

use chess::PieceColor;
use engine::{GatewayConfig, StockfishConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_DIR: &str = ".config/chess-trainer/data";
const DEV_DATA_DIR: &str = "./data";
const CONFIG_FILE: &str = "config.json";

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHESS_TRAINER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

/// Stockfish path from `CHESS_TRAINER_STOCKFISH_PATH`, if set.
pub fn stockfish_path_from_env() -> Option<PathBuf> {
    std::env::var_os("CHESS_TRAINER_STOCKFISH_PATH")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub engine: EngineConfig,
    pub pacing: PacingConfig,
    pub rush: RushConfig,
    pub battle: BattleConfig,
    /// How many of the closest-rated puzzles a rated pick chooses from.
    pub rated_window: usize,
    /// Fixed RNG seed for reproducible colour and puzzle picks.
    pub seed: Option<u64>,
    /// Always play this colour instead of a coin flip per puzzle.
    pub player_color: Option<PieceColor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub init_timeout_ms: u64,
    pub cache_capacity: usize,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: 10_000,
            cache_capacity: 100,
            threads: None,
            hash_mb: None,
        }
    }
}

/// Fixed delays that let the player see what happened before the board moves on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub opponent_reply_ms: u64,
    pub opening_move_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            opponent_reply_ms: 400,
            opening_move_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RushConfig {
    pub duration_secs: u32,
    pub max_strikes: u8,
    pub advance_ms: u64,
}

impl Default for RushConfig {
    fn default() -> Self {
        Self {
            duration_secs: 180,
            max_strikes: 3,
            advance_ms: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub target_score: u32,
    pub opponent_min_delay_ms: u64,
    pub opponent_max_delay_ms: u64,
    pub accuracy: AccuracyCurve,
    pub advance_ms: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            target_score: 5,
            opponent_min_delay_ms: 2000,
            opponent_max_delay_ms: 6000,
            accuracy: AccuracyCurve::default(),
            advance_ms: 1500,
        }
    }
}

/// Chance that the simulated battle opponent solves a puzzle of a given
/// rating: falls linearly from `max` at `base_rating` over `rating_span`,
/// bounded to `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyCurve {
    pub base_rating: u32,
    pub rating_span: u32,
    pub min: f64,
    pub max: f64,
}

impl Default for AccuracyCurve {
    fn default() -> Self {
        Self {
            base_rating: 600,
            rating_span: 2000,
            min: 0.5,
            max: 0.95,
        }
    }
}

impl BattleConfig {
    /// How long the simulated opponent takes on a puzzle of `rating`.
    /// `roll` is uniform in `[0, 1)`; harder puzzles lean to the slow end.
    pub fn opponent_delay(&self, rating: u32, roll: f64) -> Duration {
        let min = self.opponent_min_delay_ms;
        let max = self.opponent_max_delay_ms.max(min);
        let curve = &self.accuracy;
        let difficulty = ((f64::from(rating) - f64::from(curve.base_rating))
            / f64::from(curve.rating_span.max(1)))
        .clamp(0.0, 1.0);
        let weight = ((roll + difficulty) / 2.0).clamp(0.0, 1.0);
        Duration::from_millis(min + ((max - min) as f64 * weight).round() as u64)
    }
}

impl AccuracyCurve {
    pub fn accuracy(&self, rating: u32) -> f64 {
        let span = f64::from(self.rating_span.max(1));
        let raw = 1.0 - (f64::from(rating) - f64::from(self.base_rating)) / span;
        raw.clamp(self.min, self.max.max(self.min))
    }
}

impl TrainerConfig {
    /// Read `config.json` from the data directory, or defaults if it is absent.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let config = serde_json::from_str(&contents)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.init_timeout_ms)
    }

    /// Gateway settings; `stockfish` overrides `CHESS_TRAINER_STOCKFISH_PATH`.
    pub fn gateway_config(&self, stockfish: Option<PathBuf>) -> GatewayConfig {
        GatewayConfig {
            init_timeout: self.init_timeout(),
            cache_capacity: self.engine.cache_capacity.max(1),
            threads: self.engine.threads,
            hash_mb: self.engine.hash_mb,
            stockfish: StockfishConfig {
                path: stockfish.or_else(stockfish_path_from_env),
            },
        }
    }

    pub fn rated_window(&self) -> usize {
        if self.rated_window == 0 {
            8
        } else {
            self.rated_window
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_precedence() {
        // Only test in the crate that touches CHESS_TRAINER_DATA_DIR.
        std::env::set_var("CHESS_TRAINER_DATA_DIR", "/tmp/trainer-data");
        assert_eq!(get_data_dir(), PathBuf::from("/tmp/trainer-data"));

        std::env::remove_var("CHESS_TRAINER_DATA_DIR");
        let dir = get_data_dir();
        match std::env::var("HOME") {
            Ok(home) => assert_eq!(dir, PathBuf::from(home).join(DEFAULT_CONFIG_DIR)),
            Err(_) => assert_eq!(dir, PathBuf::from(DEV_DATA_DIR)),
        }
    }

    #[test]
    fn test_accuracy_curve_bounds() {
        let curve = AccuracyCurve::default();
        assert_eq!(curve.accuracy(300), 0.95);
        assert_eq!(curve.accuracy(600), 0.95);
        assert!((curve.accuracy(1200) - 0.7).abs() < 1e-9);
        assert_eq!(curve.accuracy(2400), 0.5);
    }

    #[test]
    fn test_opponent_delay_range() {
        let battle = BattleConfig::default();
        assert_eq!(battle.opponent_delay(600, 0.0), Duration::from_millis(2000));
        assert_eq!(battle.opponent_delay(2600, 0.0), Duration::from_millis(4000));
        assert_eq!(battle.opponent_delay(2600, 1.0), Duration::from_millis(6000));
        assert_eq!(battle.opponent_delay(1600, 0.5), Duration::from_millis(4000));

        let fixed = BattleConfig {
            opponent_min_delay_ms: 100,
            opponent_max_delay_ms: 50,
            ..Default::default()
        };
        assert_eq!(fixed.opponent_delay(1200, 0.9), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: TrainerConfig = serde_json::from_str(
            r#"{ "rush": { "duration_secs": 60 }, "seed": 7, "player_color": "b" }"#,
        )
        .unwrap();
        assert_eq!(config.rush.duration_secs, 60);
        assert_eq!(config.rush.max_strikes, 3);
        assert_eq!(config.battle.target_score, 5);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.player_color, Some(PieceColor::Black));
        assert_eq!(config.rated_window(), 8);
    }

    #[test]
    fn test_gateway_config_prefers_explicit_path() {
        let config = TrainerConfig::default();
        let gateway = config.gateway_config(Some(PathBuf::from("/opt/sf")));
        assert_eq!(gateway.stockfish.path, Some(PathBuf::from("/opt/sf")));
        assert_eq!(gateway.init_timeout, Duration::from_secs(10));
        assert_eq!(gateway.cache_capacity, 100);
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig::load(dir.path()).unwrap();
        assert_eq!(config, TrainerConfig::default());
    }
}
