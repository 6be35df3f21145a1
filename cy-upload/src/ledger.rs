use cy_core::{RunStore, FILES_KEY};

use crate::ContentId;

/// Identifiers of every content object created during a run, kept in the
/// run store under `files` so a teardown step can remove them.
#[derive(Debug, Clone)]
pub struct ContentLedger {
    store: RunStore,
}

impl ContentLedger {
    pub fn new(store: &RunStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Append in creation order. Duplicates are kept.
    pub fn record(&self, content_id: &ContentId) {
        self.store.append(FILES_KEY, [content_id.as_str()]);
    }

    pub fn entries(&self) -> Vec<ContentId> {
        self.store
            .list(FILES_KEY)
            .into_iter()
            .filter_map(ContentId::parse)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.store.len_of(FILES_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
