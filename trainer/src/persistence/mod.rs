mod json_store;

pub use json_store::JsonStore;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Whole-state storage: read once at startup, overwritten after every change.
pub trait StateRepository: Send + Sync {
    fn load(&self) -> Result<Option<AppState>, PersistenceError>;
    fn save(&self, state: &AppState) -> Result<(), PersistenceError>;
}

impl StateRepository for JsonStore<AppState> {
    fn load(&self) -> Result<Option<AppState>, PersistenceError> {
        JsonStore::load(self)
    }

    fn save(&self, state: &AppState) -> Result<(), PersistenceError> {
        JsonStore::save(self, state)
    }
}

/// The single persisted blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub settings: Settings,
    pub puzzle: PuzzleProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub depth: u8,
    pub multipv: u8,
    pub timer_enabled: bool,
    pub timer_seconds: u32,
    pub scoring_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            depth: 14,
            multipv: 3,
            timer_enabled: false,
            timer_seconds: 60,
            scoring_enabled: true,
        }
    }
}

impl Settings {
    pub const MIN_DEPTH: u8 = 4;
    pub const MAX_DEPTH: u8 = 30;
    pub const MAX_MULTIPV: u8 = 3;
    pub const MIN_TIMER_SECS: u32 = 10;
    pub const MAX_TIMER_SECS: u32 = 300;

    /// Pull every field into its accepted range.
    pub fn normalized(mut self) -> Self {
        self.depth = self.depth.clamp(Self::MIN_DEPTH, Self::MAX_DEPTH);
        self.multipv = self.multipv.clamp(1, Self::MAX_MULTIPV);
        self.timer_seconds = self
            .timer_seconds
            .clamp(Self::MIN_TIMER_SECS, Self::MAX_TIMER_SECS);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuzzleProgress {
    pub rating: u32,
    pub streak: u32,
    pub level: u32,
    pub history: Vec<AttemptRecord>,
}

impl Default for PuzzleProgress {
    fn default() -> Self {
        Self {
            rating: 1200,
            streak: 0,
            level: 1,
            history: Vec::new(),
        }
    }
}

impl PuzzleProgress {
    pub fn solved_count(&self) -> usize {
        self.history.iter().filter(|r| r.solved).count()
    }
}

/// One finished puzzle. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: String,
    pub solved: bool,
    pub timestamp: u64,
    /// Recorded while scoring was switched off.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unscored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_normalized() {
        let settings = Settings {
            depth: 99,
            multipv: 0,
            timer_seconds: 3,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.depth, 30);
        assert_eq!(settings.multipv, 1);
        assert_eq!(settings.timer_seconds, 10);
    }

    #[test]
    fn test_old_blob_without_settings_loads() {
        let state: AppState =
            serde_json::from_str(r#"{ "puzzle": { "rating": 1350, "history": [] } }"#).unwrap();
        assert_eq!(state.puzzle.rating, 1350);
        assert_eq!(state.puzzle.level, 1);
        assert_eq!(state.settings, Settings::default());
    }
}
