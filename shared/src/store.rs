//! Ordered key→string store seam
//!
//! The persistent namespace behind the saved commands. Backends stage
//! writes, show them to `get`, and make them durable on [`KvStore::commit`].
//! A failed commit or a [`KvStore::rollback`] drops everything staged.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by a store backend or its access guard
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("stored value under key {key:?} is corrupt")]
    Corrupt { key: String },
}

/// A key→string namespace with explicit commit
pub trait KvStore: Send {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stage `value` under `key`
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Make staged writes durable. On error nothing staged survives.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard writes staged since the last commit
    fn rollback(&mut self);
}

/// Volatile store used by tests and as a fallback backend
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    staged: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys, the count key included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.staged.get(key).or_else(|| self.entries.get(key)).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.staged.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.entries.append(&mut self.staged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}
