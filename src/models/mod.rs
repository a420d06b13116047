// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the sync layer.

pub mod credentials;
pub mod document;
pub mod queue;
pub mod session;

pub use credentials::{
    AuthState, Credentials, ExpiringToken, LoginRequest, MeResponse, StoredCredentials,
    TokenResponse,
};
pub use document::{
    CollabRoom, DocumentList, DocumentSummary, ElementsPayload, ListQuery, MetaUpdate,
    Permission, SaveElementsBody, SaveMeta, Visibility,
};
pub use queue::QueuedSave;
pub use session::{ControllerState, SaveStatus, SyncSession};
