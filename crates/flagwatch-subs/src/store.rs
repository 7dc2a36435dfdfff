//! File-based subscription store — the single source of truth.
//!
//! The whole book is persisted as one JSON document; every caller loads the
//! full map, mutates locally, and saves the full map back. Saves go through
//! a temp file and an atomic rename, so a failed save leaves the previous
//! snapshot intact. `BTreeMap`/`BTreeSet` keep serialization deterministic:
//! identical state always produces identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use flagwatch_core::error::{FlagwatchError, Result};
use flagwatch_core::types::EventInfo;

/// One record per external event id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    /// Immutable metadata snapshot captured at creation, never refreshed.
    pub info: EventInfo,
    /// Users awaiting a reminder for this event.
    #[serde(default)]
    pub subscribers: BTreeSet<u64>,
    /// Monotonic: flips false -> true when the reminder is broadcast and
    /// never reverts while the record exists.
    #[serde(default)]
    pub notified: bool,
}

impl SubscriptionRecord {
    pub fn new(info: EventInfo) -> Self {
        Self {
            info,
            subscribers: BTreeSet::new(),
            notified: false,
        }
    }
}

/// The full persisted snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionBook {
    #[serde(default)]
    pub events: BTreeMap<String, SubscriptionRecord>,
}

/// File-based subscription store.
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.join("subscriptions.json"),
        }
    }

    /// Path of the persisted document (for diagnostics and tests).
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Load the full snapshot. A missing file is an empty book; a corrupt
    /// file is logged and treated as empty rather than crashing the sweep.
    pub fn load(&self) -> SubscriptionBook {
        if !self.path.exists() {
            return SubscriptionBook::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse subscriptions.json: {e}");
                SubscriptionBook::default()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read subscriptions.json: {e}");
                SubscriptionBook::default()
            }
        }
    }

    /// Durably replace the snapshot. Writes to a temp file first and
    /// renames over the old document, so a failure at any point leaves the
    /// previously persisted snapshot observable by the next `load`.
    pub fn save(&self, book: &SubscriptionBook) -> Result<()> {
        let json = serde_json::to_string_pretty(book)
            .map_err(|e| FlagwatchError::Persistence(format!("serialize failed: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| FlagwatchError::Persistence(format!("write failed: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| FlagwatchError::Persistence(format!("rename failed: {e}")))?;

        tracing::debug!(
            "💾 Saved {} subscription record(s) to {}",
            book.events.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> (SubscriptionStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("flagwatch-test-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        (SubscriptionStore::new(&dir), dir)
    }

    fn sample_record() -> SubscriptionRecord {
        let info: EventInfo = serde_json::from_str(
            r#"{"id": 1001, "title": "Example CTF", "start": "2026-09-01T10:00:00Z"}"#,
        )
        .unwrap();
        let mut record = SubscriptionRecord::new(info);
        record.subscribers.insert(42);
        record
    }

    #[test]
    fn test_missing_file_is_empty_book() {
        let (store, dir) = temp_store("load-missing");
        assert!(store.load().events.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_load_round_trip() {
        let (store, dir) = temp_store("round-trip");
        let mut book = SubscriptionBook::default();
        book.events.insert("1001".into(), sample_record());

        store.save(&book).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, book);
        assert!(loaded.events["1001"].subscribers.contains(&42));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let (store, dir) = temp_store("corrupt");
        std::fs::write(store.file_path(), "{not json").unwrap();
        assert!(store.load().events.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (store, dir) = temp_store("atomic");
        let book = SubscriptionBook::default();
        store.save(&book).unwrap();
        assert!(store.file_path().exists());
        assert!(!store.file_path().with_extension("json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_identical_state_identical_bytes() {
        let (store, dir) = temp_store("deterministic");
        let mut book = SubscriptionBook::default();
        book.events.insert("1001".into(), sample_record());

        store.save(&book).unwrap();
        let first = std::fs::read(store.file_path()).unwrap();
        store.save(&book).unwrap();
        let second = std::fs::read(store.file_path()).unwrap();
        assert_eq!(first, second);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wire_layout_matches_contract() {
        // The on-disk document is {"events": {id: {info, subscribers, notified}}}.
        let mut book = SubscriptionBook::default();
        book.events.insert("1001".into(), sample_record());
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&book).unwrap()).unwrap();
        assert_eq!(value["events"]["1001"]["notified"], false);
        assert_eq!(value["events"]["1001"]["subscribers"][0], 42);
        assert_eq!(value["events"]["1001"]["info"]["id"], 1001);
    }
}
