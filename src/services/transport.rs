// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound requests with bearer auth and a single retry after refresh.

use crate::error::Result;
use crate::services::auth::AuthTokenManager;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// A replayable request description.
///
/// Kept separate from `reqwest::RequestBuilder` so it can be sent twice.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends requests with `Authorization: Bearer` attached.
///
/// On a 401 for a request that carried a token, refreshes once and retries
/// once; at most two requests go out per call.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    http: reqwest::Client,
    auth: AuthTokenManager,
}

impl AuthenticatedTransport {
    pub fn new(http: reqwest::Client, auth: AuthTokenManager) -> Self {
        Self { http, auth }
    }

    pub fn auth(&self) -> &AuthTokenManager {
        &self.auth
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let token = self.auth.get_valid_token().await;
        let response = self.dispatch(request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || token.is_none() {
            return Ok(response);
        }

        tracing::info!(url = %request.url, "Request unauthorized, refreshing token");
        match self.auth.refresh().await {
            Some(fresh) => self.dispatch(request, Some(&fresh)).await,
            None => {
                tracing::warn!(url = %request.url, "Refresh failed, returning original 401");
                Ok(response)
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder.send().await?)
    }
}
