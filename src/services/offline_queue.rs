// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable last-write-wins queue of diagram saves.
//!
//! Saves that could not reach the document store are kept here, one entry
//! per document, and replayed by [`OfflineSaveQueue::drain`] when
//! connectivity returns.

use crate::error::Result;
use crate::models::{QueuedSave, SaveMeta};
use crate::services::diagrams::DiagramApi;
use crate::store::{keys, KeyValueStore};
use crate::time_utils::now_ms;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Offline save queue keyed by document id.
#[derive(Clone)]
pub struct OfflineSaveQueue {
    store: Arc<dyn KeyValueStore>,
    /// Serializes drains, and drains against direct saves of a document.
    drain_lock: Arc<Mutex<()>>,
}

fn entry_key(document_id: &str) -> String {
    format!("{}{}", keys::OFFLINE_SAVE_PREFIX, document_id)
}

impl OfflineSaveQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Queue a snapshot, replacing any pending snapshot for the same document.
    pub fn enqueue(
        &self,
        document_id: &str,
        elements: Vec<Value>,
        meta: Option<SaveMeta>,
    ) -> Result<()> {
        let entry = QueuedSave {
            document_id: document_id.to_string(),
            elements,
            meta,
            enqueued_at_ms: now_ms(),
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.set(&entry_key(document_id), &raw, None)?;

        tracing::info!(
            document_id,
            elements = entry.elements.len(),
            "Save queued for later sync"
        );
        Ok(())
    }

    /// Block drains until the guard is dropped.
    ///
    /// Direct saves and deletes hold this so a drain never sends a snapshot
    /// of the same document concurrently.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.drain_lock.lock().await
    }

    /// Drop the pending snapshot for a document, if any.
    pub fn discard(&self, document_id: &str) -> Result<()> {
        self.store.delete(&entry_key(document_id))
    }

    /// Number of documents with an unsynced snapshot.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.store.keys_with_prefix(keys::OFFLINE_SAVE_PREFIX)?.len())
    }

    /// Document ids with an unsynced snapshot.
    pub fn pending_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys_with_prefix(keys::OFFLINE_SAVE_PREFIX)?
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(keys::OFFLINE_SAVE_PREFIX)
                    .map(str::to_string)
            })
            .collect())
    }

    /// Whether a snapshot for `document_id` is waiting.
    pub fn contains(&self, document_id: &str) -> Result<bool> {
        Ok(self.store.get(&entry_key(document_id))?.is_some())
    }

    /// Replay every queued snapshot, oldest first.
    ///
    /// Returns the number of documents synced. Failed entries stay queued;
    /// corrupt entries are dropped.
    pub async fn drain(&self, api: &DiagramApi) -> Result<usize> {
        let _drain = self.drain_lock.lock().await;

        let mut pending = Vec::new();
        for key in self.store.keys_with_prefix(keys::OFFLINE_SAVE_PREFIX)? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<QueuedSave>(&raw) {
                Ok(entry) => pending.push((key, raw, entry)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Dropping malformed queued save");
                    self.store.delete(&key)?;
                }
            }
        }
        pending.sort_by_key(|(_, _, entry)| entry.enqueued_at_ms);

        let mut synced = 0;
        for (key, raw, entry) in pending {
            // Superseded or discarded since listing.
            if self.store.get(&key)?.as_deref() != Some(raw.as_str()) {
                tracing::debug!(document_id = %entry.document_id, "Queued save changed before send, skipping");
                continue;
            }

            match api
                .save_elements(&entry.document_id, &entry.elements, entry.meta.as_ref())
                .await
            {
                Ok(()) => {
                    // A newer snapshot enqueued while we were sending must survive.
                    if self.store.get(&key)?.as_deref() == Some(raw.as_str()) {
                        self.store.delete(&key)?;
                    }
                    synced += 1;
                    tracing::info!(document_id = %entry.document_id, "Queued save synced");
                }
                Err(e) => {
                    tracing::warn!(
                        document_id = %entry.document_id,
                        error = %e,
                        "Queued save still failing, keeping for next drain"
                    );
                }
            }
        }

        Ok(synced)
    }
}
