// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagram load/switch/new/delete state machine.
//!
//! Each user-facing operation runs a fixed sequence of named phases. The
//! order is load-bearing:
//! 1. flush the current document's pending save before anything else
//! 2. fetch the target
//! 3. restore the scene
//! 4. adopt the new document id (memory and crash-recovery key)
//! 5. suppress the echo save of the loaded elements, clearing read-only
//! 6. apply read-only permission
//! 7. reconcile the collaboration session
//! 8. render
//!
//! Step 5 clears the read-only flag, so it must run before step 6 re-asserts it.
//! Callers serialize user-triggered switches; the controller does not lock.

use crate::error::{Result, SyncError};
use crate::models::{
    CollabRoom, ControllerState, DocumentSummary, ListQuery, MetaUpdate, SaveMeta, SaveStatus,
    SyncSession, Visibility,
};
use crate::services::diagrams::DiagramApi;
use crate::services::offline_queue::OfflineSaveQueue;
use crate::services::scene::{
    CollabSession, LoggingRenderer, NoCollab, NoPendingSaves, PassthroughRestorer,
    PendingSaveSource, RestoredScene, SceneRenderer, SceneRestorer,
};
use crate::store::{keys, KeyValueStore};
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use uuid::Uuid;

/// External collaborators driven by the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub restorer: Arc<dyn SceneRestorer>,
    pub renderer: Arc<dyn SceneRenderer>,
    pub collab: Arc<dyn CollabSession>,
    pub pending: Arc<dyn PendingSaveSource>,
}

impl Collaborators {
    /// Collaborators for running without a canvas (CLI, background sync).
    pub fn headless() -> Self {
        Self {
            restorer: Arc::new(PassthroughRestorer),
            renderer: Arc::new(LoggingRenderer),
            collab: Arc::new(NoCollab),
            pending: Arc::new(NoPendingSaves),
        }
    }
}

/// Result of [`DiagramSyncController::switch_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Loaded { read_only: bool },
    /// Nothing stored under the id; displayed state untouched.
    NotFound,
    /// Logged; phases already applied are kept.
    Failed,
}

/// SHA-256 of the serialized elements.
pub fn fingerprint(elements: &[Value]) -> String {
    let bytes = serde_json::to_vec(elements).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Remembers the fingerprint of programmatically loaded elements so the
/// auto-save they trigger is skipped exactly once.
#[derive(Debug, Default)]
struct EchoSuppressor {
    armed: Mutex<Option<String>>,
}

impl EchoSuppressor {
    fn arm(&self, elements: &[Value]) {
        *self.armed.lock().unwrap_or_else(PoisonError::into_inner) = Some(fingerprint(elements));
    }

    /// Consumes the armed fingerprint whether or not it matches.
    fn should_skip(&self, elements: &[Value]) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some_and(|armed| armed == fingerprint(elements))
    }
}

type Creation = Shared<BoxFuture<'static, ()>>;

/// Keeps local document identity, remote store, collaboration and the
/// offline queue consistent across document switches.
pub struct DiagramSyncController {
    api: DiagramApi,
    queue: OfflineSaveQueue,
    store: Arc<dyn KeyValueStore>,
    collaborators: Collaborators,
    session: watch::Sender<SyncSession>,
    suppressor: EchoSuppressor,
    /// Summaries from the latest listings; ownership/visibility source.
    summaries: DashMap<String, DocumentSummary>,
    /// Remote creations still in flight, awaited before the first real save.
    /// Each creation removes its own entry when it finishes.
    creations: Arc<DashMap<String, Creation>>,
    background: Mutex<JoinSet<()>>,
}

impl DiagramSyncController {
    pub fn new(
        api: DiagramApi,
        queue: OfflineSaveQueue,
        store: Arc<dyn KeyValueStore>,
        collaborators: Collaborators,
    ) -> Self {
        let (session, _) = watch::channel(SyncSession::default());
        Self {
            api,
            queue,
            store,
            collaborators,
            session,
            suppressor: EchoSuppressor::default(),
            summaries: DashMap::new(),
            creations: Arc::new(DashMap::new()),
            background: Mutex::new(JoinSet::new()),
        }
    }

    // ─── Session State ───────────────────────────────────────────────────────

    /// Receive every session change.
    pub fn subscribe(&self) -> watch::Receiver<SyncSession> {
        self.session.subscribe()
    }

    pub fn session(&self) -> SyncSession {
        self.session.borrow().clone()
    }

    pub fn current_document_id(&self) -> Option<String> {
        self.session.borrow().current_document_id.clone()
    }

    fn update(&self, apply: impl FnOnce(&mut SyncSession)) {
        self.session.send_modify(apply);
    }

    // ─── Switch ──────────────────────────────────────────────────────────────

    /// Open `target`, flushing the current document's pending save first.
    pub async fn switch_to(&self, target: &str) -> SwitchOutcome {
        let previous_state = self.session.borrow().state;
        self.update(|s| s.state = ControllerState::Loading);

        self.flush_pending().await;

        match self.load_target(target).await {
            Ok(Some(read_only)) => {
                tracing::info!(document_id = %target, read_only, "Switched document");
                SwitchOutcome::Loaded { read_only }
            }
            Ok(None) => {
                tracing::info!(document_id = %target, "Nothing stored for document, not switching");
                self.update(|s| s.state = previous_state);
                SwitchOutcome::NotFound
            }
            Err(e) => {
                tracing::error!(document_id = %target, error = %e, "Failed to load document");
                self.update(|s| {
                    let settled = settled_state(s);
                    s.state = settled;
                });
                SwitchOutcome::Failed
            }
        }
    }

    async fn load_target(&self, target: &str) -> Result<Option<bool>> {
        let Some((raw_elements, read_only)) = self.fetch_target(target).await? else {
            return Ok(None);
        };

        let scene = self.restore_scene(raw_elements);
        self.adopt_identity(target);
        self.suppress_echo_save(&scene.elements);
        self.apply_permission(read_only);
        self.reconcile_collab(target).await;
        self.collaborators.renderer.render(target, &scene);

        Ok(Some(read_only))
    }

    async fn fetch_target(&self, target: &str) -> Result<Option<(Vec<Value>, bool)>> {
        let Some(payload) = self.api.get_elements(target).await? else {
            return Ok(None);
        };
        let read_only = payload.is_read_only();
        if payload.has_document_meta() {
            let mut cached = self
                .summaries
                .entry(target.to_string())
                .or_insert_with(|| DocumentSummary::bare(target));
            payload.apply_to(cached.value_mut());
        }
        Ok(payload.elements.map(|elements| (elements, read_only)))
    }

    fn restore_scene(&self, raw_elements: Vec<Value>) -> RestoredScene {
        self.collaborators.restorer.restore(raw_elements)
    }

    /// Make `id` the current document, in memory and in the recovery key.
    fn adopt_identity(&self, id: &str) {
        let queued = self.queue.contains(id).unwrap_or(false);
        self.update(|s| {
            s.current_document_id = Some(id.to_string());
            s.save_status = if queued {
                SaveStatus::Queued
            } else {
                SaveStatus::Idle
            };
        });

        if let Err(e) = self.store.set(keys::CURRENT_DOCUMENT, id, None) {
            tracing::warn!(document_id = %id, error = %e, "Failed to persist current document id");
        }
    }

    fn suppress_echo_save(&self, elements: &[Value]) {
        self.suppressor.arm(elements);
        self.update(|s| s.is_read_only = false);
        self.collaborators.renderer.set_read_only(false);
    }

    fn apply_permission(&self, read_only: bool) {
        if read_only {
            self.update(|s| {
                s.is_read_only = true;
                s.save_status = SaveStatus::ReadOnly;
                s.state = ControllerState::ReadOnly;
            });
            self.collaborators.renderer.set_read_only(true);
        } else {
            self.update(|s| s.state = ControllerState::Editable);
        }
    }

    // ─── Collaboration ───────────────────────────────────────────────────────

    /// Join, leave, or clear the collab link of a just-loaded document.
    ///
    /// Only the owner (or anyone, for legacy documents) may clear a link.
    async fn reconcile_collab(&self, document_id: &str) {
        let collab = &self.collaborators.collab;
        let summary = match self.summary(document_id) {
            Some(summary) => Some(summary),
            None => self.lookup_summary(document_id).await,
        };
        let link = summary
            .as_ref()
            .and_then(|s| s.collab_link.clone())
            .filter(|link| !link.is_empty());
        let target_room = link.as_deref().and_then(CollabRoom::from_link);

        if let Some(active) = collab.active_room() {
            if target_room.as_ref() != Some(&active) {
                tracing::info!(room_id = %active.room_id, "Leaving collaboration room of previous document");
                collab.stop();
            }
        }

        self.update(|s| s.collab_link = link.clone());

        let (Some(summary), Some(link)) = (summary, link) else {
            return;
        };
        if collab.is_active() {
            return;
        }

        let user_id = self.api.transport().auth().auth_state().user_id;
        let is_owner = summary.is_owned_by(user_id.as_deref());
        let is_legacy = summary.is_legacy();

        if is_owner || is_legacy {
            tracing::info!(document_id, is_owner, is_legacy, "Clearing stale collab link");
            self.clear_stale_link(document_id);
            return;
        }

        if summary.visibility == Visibility::Public || is_legacy {
            match target_room {
                Some(room) => {
                    tracing::info!(document_id, room_id = %room.room_id, "Joining collaboration room");
                    collab.start(room);
                }
                None => tracing::warn!(document_id, link = %link, "Unparseable collab link"),
            }
        } else {
            tracing::debug!(document_id, "Private document, not auto-joining collaboration");
        }
    }

    /// Find ownership data for a document opened without a prior listing.
    async fn lookup_summary(&self, document_id: &str) -> Option<DocumentSummary> {
        match self.list_documents(&ListQuery::default()).await {
            Ok(documents) => documents.into_iter().find(|d| d.id == document_id),
            Err(e) => {
                tracing::warn!(document_id, error = %e, "Failed to look up document summary");
                None
            }
        }
    }

    /// Best-effort remote clear; failures are only logged.
    fn clear_stale_link(&self, document_id: &str) {
        self.update(|s| s.collab_link = None);
        if let Some(mut summary) = self.summaries.get_mut(document_id) {
            summary.collab_link = None;
        }

        let api = self.api.clone();
        let id = document_id.to_string();
        self.spawn_background(async move {
            if let Err(e) = api.update_meta(&id, &MetaUpdate::clear_collab_link()).await {
                tracing::warn!(document_id = %id, error = %e, "Failed to clear stale collab link");
            }
        });
    }

    // ─── New / Delete ────────────────────────────────────────────────────────

    /// Start a blank document and return its id.
    pub async fn create_new(&self) -> String {
        self.flush_pending().await;

        let id = Uuid::new_v4().to_string();
        if self.collaborators.collab.is_active() {
            self.collaborators.collab.stop();
        }

        let scene = self.restore_scene(Vec::new());
        self.adopt_identity(&id);
        self.suppress_echo_save(&scene.elements);
        self.update(|s| {
            s.state = ControllerState::Editable;
            s.collab_link = None;
        });
        self.collaborators.renderer.render(&id, &scene);
        self.spawn_remote_create(&id);

        tracing::info!(document_id = %id, "Created new document");
        id
    }

    /// Fire-and-forget creation so the id in the recovery key is never orphaned.
    fn spawn_remote_create(&self, id: &str) {
        let api = self.api.clone();
        let queue = self.queue.clone();
        let creations = self.creations.clone();
        let document_id = id.to_string();
        let creation = async move {
            if let Err(e) = api.save_elements(&document_id, &[], None).await {
                tracing::warn!(document_id = %document_id, error = %e, "Remote create failed, queuing");
                // A real save may have queued newer content meanwhile.
                if !queue.contains(&document_id).unwrap_or(false) {
                    if let Err(e) = queue.enqueue(&document_id, Vec::new(), None) {
                        tracing::error!(document_id = %document_id, error = %e, "Failed to queue remote create");
                    }
                }
            }
            creations.remove(&document_id);
        }
        .boxed()
        .shared();

        self.creations.insert(id.to_string(), creation.clone());
        self.spawn_background(creation);
    }

    async fn await_creation(&self, id: &str) {
        let creation = self.creations.get(id).map(|c| c.clone());
        if let Some(creation) = creation {
            creation.await;
        }
    }

    /// Delete a document. If it is the open one, a blank document replaces
    /// it first so no in-flight auto-save can recreate it.
    pub async fn delete_current(&self, target: &str) -> Result<()> {
        if self.current_document_id().as_deref() == Some(target) {
            tracing::info!(document_id = %target, "Deleting open document, switching to blank first");
            self.create_new().await;
        }

        self.await_creation(target).await;
        let _exclusive = self.queue.exclusive().await;
        if let Err(e) = self.queue.discard(target) {
            tracing::warn!(document_id = %target, error = %e, "Failed to discard queued save");
        }

        self.api.delete(target).await?;
        self.summaries.remove(target);

        // Never loaded here, so no blank document replaced the recovery key.
        if self.store.get(keys::CURRENT_DOCUMENT)?.as_deref() == Some(target) {
            self.store.delete(keys::CURRENT_DOCUMENT)?;
            tracing::info!(document_id = %target, "Cleared recovery key of deleted document");
        }
        tracing::info!(document_id = %target, "Deleted document");
        Ok(())
    }

    // ─── Saving ──────────────────────────────────────────────────────────────

    /// Save elements to the current document (auto-save entry point).
    ///
    /// Skips read-only documents and the echo of a programmatic load; on
    /// failure the snapshot is queued offline.
    pub async fn save_current(&self, elements: Vec<Value>, meta: Option<SaveMeta>) -> SaveStatus {
        let id = match self.current_document_id() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                tracing::info!(document_id = %id, "No current document, adopting new id for save");
                self.adopt_identity(&id);
                id
            }
        };

        if self.session.borrow().is_read_only {
            self.set_status_for(&id, SaveStatus::ReadOnly);
            return SaveStatus::ReadOnly;
        }

        if self.suppressor.should_skip(&elements) {
            tracing::debug!(document_id = %id, "Skipping save of programmatically loaded elements");
            return self.session.borrow().save_status;
        }

        self.await_creation(&id).await;
        // Held until the queue reflects this save.
        let _exclusive = self.queue.exclusive().await;
        self.set_status_for(&id, SaveStatus::Saving);

        let status = match self.api.save_elements(&id, &elements, meta.as_ref()).await {
            Ok(()) => {
                // The queued snapshot is older than what we just wrote.
                if let Err(e) = self.queue.discard(&id) {
                    tracing::warn!(document_id = %id, error = %e, "Failed to discard superseded queued save");
                }
                tracing::debug!(document_id = %id, "Saved document");
                SaveStatus::Saved
            }
            Err(e) => {
                if e.is_transport_failure() {
                    tracing::warn!(document_id = %id, error = %e, "Save failed, queuing offline");
                } else {
                    tracing::error!(document_id = %id, error = %e, "Save failed, queuing offline");
                }
                match self.queue.enqueue(&id, elements, meta) {
                    Ok(()) => SaveStatus::Queued,
                    Err(qe) => {
                        tracing::error!(document_id = %id, error = %qe, "Failed to queue save");
                        SaveStatus::Error
                    }
                }
            }
        };

        self.set_status_for(&id, status);
        status
    }

    /// Update the save status only if `id` is still the current document.
    fn set_status_for(&self, id: &str, status: SaveStatus) {
        self.update(|s| {
            if s.current_document_id.as_deref() == Some(id) {
                s.save_status = status;
            }
        });
    }

    /// Save the debounced auto-saver's pending edits to the current document.
    async fn flush_pending(&self) {
        let Some(pending) = self.collaborators.pending.take_pending() else {
            return;
        };
        let status = self.save_current(pending.elements, pending.meta).await;
        tracing::debug!(?status, "Flushed pending save");
    }

    // ─── Recovery & Connectivity ─────────────────────────────────────────────

    /// Reopen the document that was current when the process last ran.
    pub async fn restore_last_session(&self) -> Option<SwitchOutcome> {
        let id = match self.store.get(keys::CURRENT_DOCUMENT) {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read last document id");
                return None;
            }
        };

        // An unsynced creation would otherwise load as not found.
        if self.queue.contains(&id).unwrap_or(false) {
            if let Err(e) = self.queue.drain(&self.api).await {
                tracing::warn!(error = %e, "Drain before session restore failed");
            }
        }

        tracing::info!(document_id = %id, "Restoring last session");
        Some(self.switch_to(&id).await)
    }

    /// Replay queued saves; call when connectivity returns.
    pub async fn on_reconnect(&self) -> Result<usize> {
        let synced = self.queue.drain(&self.api).await?;

        if let Some(id) = self.current_document_id() {
            let still_queued = self.queue.contains(&id)?;
            self.update(|s| {
                if s.save_status == SaveStatus::Queued && !still_queued {
                    s.save_status = SaveStatus::Saved;
                }
            });
        }

        tracing::info!(synced, "Reconnected, queued saves drained");
        Ok(synced)
    }

    // ─── Listing & Metadata ──────────────────────────────────────────────────

    /// List documents and remember their summaries for reconciliation.
    pub async fn list_documents(&self, query: &ListQuery) -> Result<Vec<DocumentSummary>> {
        let documents = self.api.list(query).await?;
        self.remember_summaries(&documents);
        Ok(documents)
    }

    pub async fn search_documents(
        &self,
        q: &str,
        project: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<DocumentSummary>> {
        let documents = self.api.search(q, project, limit).await?;
        self.remember_summaries(&documents);
        Ok(documents)
    }

    /// Record summaries obtained elsewhere (e.g. a share link lookup).
    pub fn remember_summaries(&self, documents: &[DocumentSummary]) {
        for document in documents {
            self.summaries.insert(document.id.clone(), document.clone());
        }
    }

    pub fn summary(&self, id: &str) -> Option<DocumentSummary> {
        self.summaries.get(id).map(|s| s.clone())
    }

    pub async fn update_meta(&self, id: &str, update: &MetaUpdate) -> Result<()> {
        self.api.update_meta(id, update).await?;

        if let Some(mut summary) = self.summaries.get_mut(id) {
            if let Some(title) = &update.title {
                summary.title = title.clone();
            }
            if let Some(project) = &update.project {
                summary.project = Some(project.clone());
            }
            if let Some(tags) = &update.tags {
                summary.tags = tags.clone();
            }
            if let Some(pinned) = update.pinned {
                summary.pinned = pinned;
            }
            if let Some(link) = &update.collab_link {
                summary.collab_link = link.clone();
            }
        }
        Ok(())
    }

    pub async fn set_visibility(&self, id: &str, visibility: Visibility) -> Result<()> {
        self.api.set_visibility(id, visibility).await?;
        if let Some(mut summary) = self.summaries.get_mut(id) {
            summary.visibility = visibility;
        }
        Ok(())
    }

    // ─── Background Tasks ────────────────────────────────────────────────────

    fn spawn_background<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut tasks);
        tasks.spawn(task);
    }

    /// Background tasks not yet finished and reaped.
    pub fn background_tasks(&self) -> usize {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut tasks);
        tasks.len()
    }

    /// Remote creations that have not finished yet.
    pub fn in_flight_creations(&self) -> usize {
        self.creations.len()
    }

    /// Wait for fire-and-forget work (remote creates, link clears) to finish.
    pub async fn wait_for_background(&self) {
        let mut tasks = {
            let mut guard = self.background.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Background task failed");
            }
        }
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Background task failed");
        }
    }
}

/// State after a failed load: whatever the applied phases left behind.
fn settled_state(session: &SyncSession) -> ControllerState {
    if session.is_read_only {
        ControllerState::ReadOnly
    } else if session.current_document_id.is_some() {
        ControllerState::Editable
    } else {
        ControllerState::Idle
    }
}

impl SwitchOutcome {
    /// Read-only flag of a loaded document, or an error for the CLI to report.
    pub fn into_result(self, document_id: &str) -> Result<bool> {
        match self {
            SwitchOutcome::Loaded { read_only } => Ok(read_only),
            SwitchOutcome::NotFound => Err(SyncError::NotFound(document_id.to_string())),
            SwitchOutcome::Failed => Err(SyncError::Internal(anyhow::anyhow!(
                "Failed to load document {}",
                document_id
            ))),
        }
    }
}
