// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-file backed store.
//!
//! The whole map is rewritten on every mutation (temp file + rename), which
//! keeps batches atomic. The store only ever holds a handful of credential
//! entries plus one entry per unsynced document.

use super::{KeyValueStore, StoreEntry, StoredValue};
use crate::error::{Result, SyncError};
use crate::time_utils::now_ms;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

const STORE_FILE_NAME: &str = "store.json";

/// Durable store persisted as `<dir>/store.json`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, StoredValue>>,
}

impl FileStore {
    /// Open (or create) the store inside `dir`.
    ///
    /// A corrupt store file is logged and replaced by an empty map.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE_NAME);

        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "Store file corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "Opened durable store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &BTreeMap<String, StoredValue>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| SyncError::Storage(format!("Failed to replace store file: {}", e)))
    }

    /// Apply a mutation and persist; the in-memory map is only updated if the
    /// write succeeds.
    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, StoredValue>)) -> Result<()> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        apply(&mut next);
        let now = now_ms();
        next.retain(|_, stored| !stored.is_expired_at(now));
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.lock();
        Ok(guard
            .get(key)
            .filter(|stored| !stored.is_expired_at(now_ms()))
            .map(|stored| stored.value.clone()))
    }

    fn set(&self, key: &str, value: &str, expires_at_ms: Option<i64>) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    expires_at_ms,
                },
            );
        })
    }

    fn set_many(&self, batch: &[StoreEntry]) -> Result<()> {
        self.mutate(|entries| {
            for entry in batch {
                entries.insert(
                    entry.key.clone(),
                    StoredValue {
                        value: entry.value.clone(),
                        expires_at_ms: entry.expires_at_ms,
                    },
                );
            }
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        if !self.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn delete_many(&self, keys: &[&str]) -> Result<()> {
        self.mutate(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = now_ms();
        let guard = self.lock();
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, stored)| !stored.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
