// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store REST client.
//!
//! Handles:
//! - Listing and searching diagrams
//! - Loading and saving diagram elements
//! - Metadata, visibility and deletion

use crate::error::{Result, SyncError};
use crate::models::{
    DocumentList, DocumentSummary, ElementsPayload, ListQuery, MeResponse, MetaUpdate,
    SaveElementsBody, SaveMeta, Visibility,
};
use crate::services::transport::{ApiRequest, AuthenticatedTransport};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Typed client for the diagram endpoints.
#[derive(Clone)]
pub struct DiagramApi {
    transport: AuthenticatedTransport,
    base_url: String,
}

impl DiagramApi {
    pub fn new(transport: AuthenticatedTransport, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    fn diagram_url(&self, id: &str, suffix: &str) -> String {
        format!(
            "{}/diagrams/{}{}",
            self.base_url,
            urlencoding::encode(id),
            suffix
        )
    }

    /// List diagrams visible to the caller.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<DocumentSummary>> {
        let request = ApiRequest::get(format!("{}/diagrams", self.base_url))
            .with_query(query.to_query_pairs());
        let list: DocumentList = self.send_json(&request).await?;
        Ok(list.diagrams)
    }

    /// Full-text search over diagram titles and content.
    pub async fn search(
        &self,
        q: &str,
        project: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<DocumentSummary>> {
        let mut query = vec![("q".to_string(), q.to_string())];
        if let Some(project) = project {
            query.push(("project".to_string(), project.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit".to_string(), limit.to_string()));
        }

        let request =
            ApiRequest::get(format!("{}/diagrams/search", self.base_url)).with_query(query);
        let list: DocumentList = self.send_json(&request).await?;
        Ok(list.diagrams)
    }

    /// Load a diagram's elements. `Ok(None)` if the diagram does not exist.
    pub async fn get_elements(&self, id: &str) -> Result<Option<ElementsPayload>> {
        let request = ApiRequest::get(self.diagram_url(id, "/elements"));
        match self.send_json(&request).await {
            Ok(payload) => Ok(Some(payload)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Save (create or overwrite) a diagram's elements.
    pub async fn save_elements(
        &self,
        id: &str,
        elements: &[Value],
        meta: Option<&SaveMeta>,
    ) -> Result<()> {
        let body = serde_json::to_value(SaveElementsBody { elements, meta })?;
        let request = ApiRequest::put(self.diagram_url(id, "/elements")).with_json(body);
        self.send_ok(&request).await
    }

    /// Update title/project/tags/pinned/collab link.
    pub async fn update_meta(&self, id: &str, update: &MetaUpdate) -> Result<()> {
        let request =
            ApiRequest::put(self.diagram_url(id, "/meta")).with_json(serde_json::to_value(update)?);
        self.send_ok(&request).await
    }

    pub async fn set_visibility(&self, id: &str, visibility: Visibility) -> Result<()> {
        let request = ApiRequest::put(self.diagram_url(id, "/visibility"))
            .with_json(serde_json::json!({ "visibility": visibility }));
        self.send_ok(&request).await
    }

    /// Delete a diagram. Deleting one that is already gone succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = ApiRequest::delete(self.diagram_url(id, ""));
        match self.send_ok(&request).await {
            Err(SyncError::NotFound(_)) => {
                tracing::debug!(document_id = %id, "Diagram already deleted");
                Ok(())
            }
            other => other,
        }
    }

    /// Ask the server who we are.
    pub async fn me(&self) -> Result<MeResponse> {
        let request = ApiRequest::get(format!("{}/auth/me", self.base_url));
        self.send_json(&request).await
    }

    async fn send_ok(&self, request: &ApiRequest) -> Result<()> {
        let response = self.transport.send(request).await?;
        check_response(response, &request.url).await?;
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = self.transport.send(request).await?;
        let response = check_response(response, &request.url).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Malformed(format!("JSON parse error: {}", e)))
    }
}

/// Check response status and return an error if not successful.
async fn check_response(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 => Err(SyncError::Unauthorized),
        404 => Err(SyncError::NotFound(url.to_string())),
        code => {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = code, url, "Document store request failed");
            Err(SyncError::Http { status: code, body })
        }
    }
}
