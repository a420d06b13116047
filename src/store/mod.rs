// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable key-value storage for credentials, queued saves and crash recovery.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Key names as constants.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "diagram_sync.access_token";
    pub const ACCESS_TOKEN_EXPIRY: &str = "diagram_sync.access_token_expiry";
    pub const REFRESH_TOKEN: &str = "diagram_sync.refresh_token";
    pub const REFRESH_TOKEN_EXPIRY: &str = "diagram_sync.refresh_token_expiry";
    /// Last active document, read at startup for crash recovery
    pub const CURRENT_DOCUMENT: &str = "diagram_sync.current_document_id";
    /// One entry per pending document save
    pub const OFFLINE_SAVE_PREFIX: &str = "diagram_sync.offline_save/";
}

/// One write in a [`KeyValueStore::set_many`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub key: String,
    pub value: String,
    pub expires_at_ms: Option<i64>,
}

impl StoreEntry {
    pub fn new(key: &str, value: impl Into<String>, expires_at_ms: Option<i64>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            expires_at_ms,
        }
    }
}

/// Value as held by the backends, with its optional expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
}

impl StoredValue {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|exp| exp <= now_ms)
    }
}

/// Minimal persistent key-value capability.
///
/// Entries past their expiry read as absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str, expires_at_ms: Option<i64>) -> Result<()>;

    /// Write several entries. Backends that can persist them in one step
    /// override this so readers never observe a partial batch.
    fn set_many(&self, entries: &[StoreEntry]) -> Result<()> {
        for entry in entries {
            self.set(&entry.key, &entry.value, entry.expires_at_ms)?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()>;

    /// Delete several keys.
    fn delete_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Unexpired keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
