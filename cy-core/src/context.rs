//! Context carried with every cyfarm operation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{CyConfigSnapshot, RunStore};

/// Remote account the run acts for (the phone number of the storage account).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-run context, created once and passed by reference to every component.
///
/// The store is shared with the glue that runs other tasks and with the
/// collaborator that persists it when the run ends.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub account: AccountId,
    pub started_at: DateTime<Utc>,
    pub store: RunStore,
    pub config: CyConfigSnapshot,
}

impl RunContext {
    pub fn new<S: Into<String>>(account: S) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            account: AccountId(account.into()),
            started_at: Utc::now(),
            store: RunStore::new(),
            config: CyConfigSnapshot::default(),
        }
    }

    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_config(mut self, config: CyConfigSnapshot) -> Self {
        self.config = config;
        self
    }

    pub fn with_run_id(mut self, run_id: String) -> Self {
        self.run_id = run_id;
        self
    }
}
