// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Seams to the canvas, renderer, collaboration session and auto-saver.
//!
//! The controller drives these; it never reaches into rendering state.
//! Headless implementations back the CLI.

use crate::models::{CollabRoom, SaveMeta};
use serde_json::Value;

/// Canonical scene produced by the canvas `restore` routine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredScene {
    pub elements: Vec<Value>,
    pub app_state: Value,
}

/// Edits the debounced auto-saver has not written yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSave {
    pub elements: Vec<Value>,
    pub meta: Option<SaveMeta>,
}

/// Canvas restore/repair of raw stored elements.
pub trait SceneRestorer: Send + Sync {
    fn restore(&self, raw_elements: Vec<Value>) -> RestoredScene;
}

/// Display side: swaps the shown document and toggles read-only mode.
pub trait SceneRenderer: Send + Sync {
    fn set_read_only(&self, read_only: bool);
    fn render(&self, document_id: &str, scene: &RestoredScene);
}

/// Live collaboration session signals.
pub trait CollabSession: Send + Sync {
    /// Room of the running session, if any.
    fn active_room(&self) -> Option<CollabRoom>;
    fn start(&self, room: CollabRoom);
    fn stop(&self);

    fn is_active(&self) -> bool {
        self.active_room().is_some()
    }
}

/// Debounced auto-saver holding not-yet-written edits.
pub trait PendingSaveSource: Send + Sync {
    /// Take (and cancel) the pending debounced save, if any.
    fn take_pending(&self) -> Option<PendingSave>;
}

/// Returns stored elements unchanged with an empty app state.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRestorer;

impl SceneRestorer for PassthroughRestorer {
    fn restore(&self, raw_elements: Vec<Value>) -> RestoredScene {
        RestoredScene {
            elements: raw_elements,
            app_state: Value::Object(Default::default()),
        }
    }
}

/// Renderer that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRenderer;

impl SceneRenderer for LoggingRenderer {
    fn set_read_only(&self, read_only: bool) {
        tracing::debug!(read_only, "Renderer read-only toggled");
    }

    fn render(&self, document_id: &str, scene: &RestoredScene) {
        tracing::info!(
            document_id,
            elements = scene.elements.len(),
            "Rendered document"
        );
    }
}

/// No collaboration available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCollab;

impl CollabSession for NoCollab {
    fn active_room(&self) -> Option<CollabRoom> {
        None
    }

    fn start(&self, room: CollabRoom) {
        tracing::debug!(room_id = %room.room_id, "Collaboration not available, not joining");
    }

    fn stop(&self) {}
}

/// No debounced edits ever pending.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPendingSaves;

impl PendingSaveSource for NoPendingSaves {
    fn take_pending(&self) -> Option<PendingSave> {
        None
    }
}
