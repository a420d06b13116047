// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory session state published by the sync controller.

use serde::Serialize;

/// User-visible save state of the current document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
    #[serde(rename = "readonly")]
    ReadOnly,
    Queued,
}

/// Controller state machine position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    #[default]
    Idle,
    Loading,
    #[serde(rename = "readonly")]
    ReadOnly,
    Editable,
}

/// Snapshot of the active tab's sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSession {
    pub current_document_id: Option<String>,
    pub save_status: SaveStatus,
    pub is_read_only: bool,
    pub collab_link: Option<String>,
    pub state: ControllerState,
}
