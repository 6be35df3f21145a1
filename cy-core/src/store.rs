//! Shared run store.
//!
//! Every task of a run appends into the same [`RunStore`]. It is created
//! once per run, handed by reference to whatever needs it, and serialized
//! at the end of the run through [`RunStore::snapshot`].

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Key under which created content identifiers are collected for cleanup.
pub const FILES_KEY: &str = "files";

/// Process-scoped associative store of ordered string lists.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<String>>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store persisted by a previous run.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            entries: Arc::new(RwLock::new(snapshot.entries)),
        }
    }

    /// Append values to the list stored under `key`, creating it if needed.
    ///
    /// Values are kept in insertion order and never deduplicated.
    pub fn append<K, I, V>(&self, key: K, values: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut entries = self.entries.write();
        entries
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Copy of the list under `key`; empty when absent.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    pub fn len_of(&self, key: &str) -> usize {
        self.entries.read().get(key).map_or(0, Vec::len)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            entries: self.entries.read().clone(),
        }
    }
}

/// Serializable view of a [`RunStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreSnapshot {
    entries: BTreeMap<String, Vec<String>>,
}

impl StoreSnapshot {
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
