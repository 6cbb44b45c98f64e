use serde::{Deserialize, Serialize};

/// Behavior switches for a `Persister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    /// Delete one-to-many targets that the incoming document no longer lists
    pub foreign_collection_cleanup: bool,
    /// Log a warning for document keys that map onto no field
    pub warn_unmapped_keys: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            foreign_collection_cleanup: true,
            warn_unmapped_keys: true,
        }
    }
}

impl PersistOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave stale one-to-many targets in place instead of deleting them
    pub fn disable_foreign_collection_cleanup(mut self) -> Self {
        self.foreign_collection_cleanup = false;
        self
    }

    /// Skip unmapped document keys silently
    pub fn disable_unmapped_key_warnings(mut self) -> Self {
        self.warn_unmapped_keys = false;
        self
    }
}
