// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync logic layer.

pub mod auth;
pub mod diagrams;
pub mod offline_queue;
pub mod scene;
pub mod single_flight;
pub mod sync_controller;
pub mod token_store;
pub mod transport;

pub use auth::AuthTokenManager;
pub use diagrams::DiagramApi;
pub use offline_queue::OfflineSaveQueue;
pub use scene::{
    CollabSession, PendingSave, PendingSaveSource, RestoredScene, SceneRenderer, SceneRestorer,
};
pub use single_flight::SingleFlight;
pub use sync_controller::{Collaborators, DiagramSyncController, SwitchOutcome};
pub use token_store::TokenStore;
pub use transport::{ApiRequest, AuthenticatedTransport};
