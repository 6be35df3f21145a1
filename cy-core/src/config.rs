//! # cyfarm Configuration
//!
//! A minimal configuration system based on a simple string key/value
//! store. Components read typed values out of an immutable
//! [`CyConfigSnapshot`] and fall back to their own defaults.
//!
//! ## Setting and reading values
//! ```rust
//! use cy_core::CyConfig;
//! let mut config = CyConfig::new();
//!
//! config.set("upload.throttle_ms", "3000");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_u64("upload.throttle_ms"), Some(3000));
//! ```
//!
//! ## Environment overrides
//! [`CyConfig::load_env`] copies every variable carrying a prefix into the
//! store, lower-casing it and turning `__` into `.`:
//!
//! ```bash
//! export CYFARM__UPLOAD__THROTTLE_MS=5000   # → upload.throttle_ms
//! ```

use std::collections::HashMap;

use anyhow::anyhow;

#[derive(Debug, Default)]
pub struct CyConfig {
    values: HashMap<String, String>,
}

impl CyConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Build a store from the process environment, keeping only variables
    /// that start with `prefix`.
    pub fn from_env(prefix: &str) -> Self {
        let mut config = Self::new();
        config.load_env(prefix);
        config
    }

    /// Set a configuration key to a string value.
    ///
    /// Example: config.set("upload.extension", ".mp4")
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    ///
    /// Returns None if the key is not present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Overlay environment variables carrying `prefix`.
    ///
    /// `CYFARM__UPLOAD__CHUNK_SIZE` with prefix `CYFARM__` becomes
    /// `upload.chunk_size`. Returns how many keys were loaded.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_pairs(prefix, std::env::vars())
    }

    fn load_pairs<I>(&mut self, prefix: &str, pairs: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in pairs {
            if let Some(stripped) = key.strip_prefix(prefix) {
                if stripped.is_empty() {
                    continue;
                }
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> CyConfigSnapshot {
        CyConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CyConfigSnapshot {
    map: HashMap<String, String>,
}

impl CyConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .ok_or_else(|| anyhow!("Missing '{}' configuration value", key))
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
