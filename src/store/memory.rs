// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and ephemeral sessions.

use super::{KeyValueStore, StoredValue};
use crate::error::Result;
use crate::time_utils::now_ms;
use dashmap::DashMap;

/// Process-local key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = now_ms();
        // Purge lazily; remove_if avoids holding a read guard across the removal.
        if self
            .entries
            .remove_if(key, |_, stored| stored.is_expired_at(now))
            .is_some()
        {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|stored| stored.value.clone()))
    }

    fn set(&self, key: &str, value: &str, expires_at_ms: Option<i64>) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = now_ms();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && !entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
