//! cy-core: framework-agnostic core for the cyfarm tooling.
//!
//! Holds the pieces every task runner shares: a string key/value
//! configuration with environment overlay, the process-scoped
//! [`RunContext`] and the [`RunStore`] that collects state across tasks.

pub mod config;
pub mod context;
pub mod store;

pub use config::{CyConfig, CyConfigSnapshot};
pub use context::{AccountId, RunContext};
pub use store::{RunStore, StoreSnapshot, FILES_KEY};
