// Blocklist stores: a JSON file for real deployments, memory for tests.
//
// File format: {"words": ["phrase one", "phrase two"]}

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::traits::BlocklistStore;
use crate::classify::blocklist::normalize_entry;

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlocklistFile {
    #[serde(default)]
    words: Vec<String>,
}

/// Blocklist persisted as pretty-printed JSON at a fixed path.
pub struct JsonBlocklistStore {
    path: PathBuf,
}

impl JsonBlocklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the parent directory and an empty list if nothing exists yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.save(&[])?;
        info!(path = %self.path.display(), "Created empty blocklist file");
        Ok(())
    }
}

impl BlocklistStore for JsonBlocklistStore {
    fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let file: BlocklistFile = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid blocklist JSON in {}", self.path.display()))?;

        let mut words: Vec<String> = Vec::with_capacity(file.words.len());
        for word in file.words.iter().map(|w| normalize_entry(w)) {
            if !word.is_empty() && !words.contains(&word) {
                words.push(word);
            }
        }
        debug!(path = %self.path.display(), count = words.len(), "Loaded blocklist");
        Ok(words)
    }

    fn save(&self, words: &[String]) -> Result<()> {
        let file = BlocklistFile {
            words: words.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Blocklist kept only in memory.
#[derive(Default)]
pub struct MemoryBlocklistStore {
    words: Mutex<Vec<String>>,
}

impl MemoryBlocklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: Mutex::new(words.into_iter().map(|w| normalize_entry(w.as_ref())).collect()),
        }
    }
}

impl BlocklistStore for MemoryBlocklistStore {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self
            .words
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, words: &[String]) -> Result<()> {
        *self.words.lock().unwrap_or_else(PoisonError::into_inner) = words.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonBlocklistStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn ensure_exists_creates_parent_and_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("blocked_words.json");
        let store = JsonBlocklistStore::new(&path);
        store.ensure_exists().unwrap();
        assert!(path.exists());
        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["words"], serde_json::json!([]));
    }

    #[test]
    fn save_then_load_normalizes_hand_edited_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        fs::write(&path, r#"{"words": ["  Foo ", "foo", "", "Bar Baz"]}"#).unwrap();
        let store = JsonBlocklistStore::new(&path);
        assert_eq!(store.load().unwrap(), vec!["foo", "bar baz"]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        fs::write(&path, "not json").unwrap();
        let err = JsonBlocklistStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Invalid blocklist JSON"));
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryBlocklistStore::with_words(["One"]);
        assert_eq!(store.load().unwrap(), vec!["one"]);
        store.save(&["two".to_string()]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["two"]);
    }
}
