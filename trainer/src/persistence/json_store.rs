use super::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Single JSON document on disk.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a reader sees either the previous document or the new one.
pub struct JsonStore<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn save(&self, data: &T) -> Result<(), PersistenceError> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Returns None if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<T>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let data = serde_json::from_str(&contents)?;
        Ok(Some(data))
    }

    pub fn delete(&self) -> Result<(), PersistenceError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{AppState, AttemptRecord};
    use tempfile::TempDir;

    fn make_store(dir: &TempDir) -> JsonStore<AppState> {
        JsonStore::new(dir.path().join("nested").join("state.json"))
    }

    #[test]
    fn test_load_before_save_is_none() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);

        let mut state = AppState::default();
        state.puzzle.rating = 1412;
        state.puzzle.history.push(AttemptRecord {
            id: "fool-2".to_string(),
            solved: true,
            timestamp: 1_700_000_000,
            unscored: false,
        });
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let mut state = AppState::default();
        store.save(&state).unwrap();
        state.puzzle.streak = 3;
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap().unwrap().puzzle.streak, 3);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(PersistenceError::Json(_))));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.save(&AppState::default()).unwrap();
        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
