// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store wire models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who can see a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// Permission the server grants the caller on a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[serde(alias = "view", alias = "readonly")]
    Read,
    #[serde(alias = "edit", alias = "owner")]
    Write,
    #[serde(other)]
    Unknown,
}

impl Permission {
    pub fn is_read_only(self) -> bool {
        self == Permission::Read
    }
}

/// Document listing entry, owned by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Absent for documents created before ownership existed
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, alias = "url")]
    pub share_url: Option<String>,
    /// Set while (or after) a live collaboration room was attached
    #[serde(default)]
    pub collab_link: Option<String>,
    #[serde(default)]
    pub element_count: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl DocumentSummary {
    /// Summary carrying only an id; other fields take their defaults.
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            project: None,
            tags: Vec::new(),
            pinned: false,
            owner_id: None,
            visibility: Visibility::default(),
            share_url: None,
            collab_link: None,
            element_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Legacy documents predate the ownership model.
    pub fn is_legacy(&self) -> bool {
        self.owner_id.as_deref().map_or(true, str::is_empty)
    }

    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        match (self.owner_id.as_deref(), user_id) {
            (Some(owner), Some(user)) => !owner.is_empty() && owner == user,
            _ => false,
        }
    }
}

/// `GET /diagrams` and `GET /diagrams/search` response.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub diagrams: Vec<DocumentSummary>,
}

/// `GET /diagrams/{id}/elements` response.
///
/// Some servers also return the document's ownership fields here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementsPayload {
    #[serde(default)]
    pub elements: Option<Vec<Value>>,
    #[serde(default)]
    pub permission: Option<Permission>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub collab_link: Option<String>,
}

impl ElementsPayload {
    pub fn is_read_only(&self) -> bool {
        self.permission.is_some_and(Permission::is_read_only)
    }

    pub fn has_document_meta(&self) -> bool {
        self.owner_id.is_some() || self.visibility.is_some() || self.collab_link.is_some()
    }

    /// Overwrite the ownership fields of `summary` with those present here.
    ///
    /// A payload with a link but no owner describes a legacy document, so
    /// the owner is taken as-is whenever any field is present.
    pub fn apply_to(&self, summary: &mut DocumentSummary) {
        if !self.has_document_meta() {
            return;
        }
        summary.owner_id = self.owner_id.clone();
        if let Some(visibility) = self.visibility {
            summary.visibility = visibility;
        }
        summary.collab_link = self.collab_link.clone();
    }
}

/// Optional metadata saved together with elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// `PUT /diagrams/{id}/elements` body.
#[derive(Debug, Clone, Serialize)]
pub struct SaveElementsBody<'a> {
    pub elements: &'a [Value],
    #[serde(flatten)]
    pub meta: Option<&'a SaveMeta>,
}

/// `PUT /diagrams/{id}/meta` body. Unset fields are left alone by the server.
///
/// `collab_link: Some(None)` serializes as `null` and clears the link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collab_link: Option<Option<String>>,
}

impl MetaUpdate {
    pub fn clear_collab_link() -> Self {
        Self {
            collab_link: Some(None),
            ..Self::default()
        }
    }
}

/// Filters for `GET /diagrams`.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub mine: bool,
}

impl ListQuery {
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(project) = &self.project {
            pairs.push(("project".to_string(), project.clone()));
        }
        if !self.tags.is_empty() {
            pairs.push(("tags".to_string(), self.tags.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if self.mine {
            pairs.push(("mine".to_string(), "true".to_string()));
        }
        pairs
    }
}

/// Parameters of a live collaboration room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollabRoom {
    pub room_id: String,
    pub room_key: String,
}

impl CollabRoom {
    /// Parse a collab link of the form `https://host/path#room=<id>,<key>`.
    pub fn from_link(link: &str) -> Option<Self> {
        let url = reqwest::Url::parse(link).ok()?;
        let params = url.fragment()?.strip_prefix("room=")?;
        let (room_id, room_key) = params.split_once(',')?;
        if room_id.is_empty() || room_key.is_empty() {
            return None;
        }
        Some(Self {
            room_id: room_id.to_string(),
            room_key: room_key.to_string(),
        })
    }
}
