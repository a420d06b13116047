// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diagram-Sync: keep a drawing canvas in step with a remote document store
//!
//! This crate provides bearer-token lifecycle management, an authenticated
//! REST client with retry-after-refresh, a durable offline save queue, and
//! the controller that orders document switches, saves and collaboration.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::{
    AuthTokenManager, AuthenticatedTransport, Collaborators, DiagramApi, DiagramSyncController,
    OfflineSaveQueue, TokenStore,
};
use std::sync::Arc;
use store::KeyValueStore;

/// Shared client state, wired once at startup.
pub struct SyncClient {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub auth: AuthTokenManager,
    pub api: DiagramApi,
    pub queue: OfflineSaveQueue,
}

impl SyncClient {
    /// Wire auth, transport, REST client and queue over one durable store.
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let http = config.http_client()?;
        let auth = AuthTokenManager::new(http.clone(), TokenStore::new(store.clone()), &config);
        let transport = AuthenticatedTransport::new(http, auth.clone());
        let api = DiagramApi::new(transport, &config.api_base_url);
        let queue = OfflineSaveQueue::new(store.clone());

        Ok(Self {
            config,
            store,
            auth,
            api,
            queue,
        })
    }

    /// Build a controller sharing this client's store, API and queue.
    pub fn controller(&self, collaborators: Collaborators) -> DiagramSyncController {
        DiagramSyncController::new(
            self.api.clone(),
            self.queue.clone(),
            self.store.clone(),
            collaborators,
        )
    }
}
