// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline save queue entry.

use crate::models::SaveMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A save intent waiting for connectivity, keyed by document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSave {
    pub document_id: String,
    pub elements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SaveMeta>,
    pub enqueued_at_ms: i64,
}
