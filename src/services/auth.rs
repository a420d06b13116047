// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token lifecycle: login, single-flight refresh, logout.
//!
//! Handles:
//! - Returning the stored access token while it is valid
//! - Refreshing it through the refresh endpoint when it is not
//! - Collapsing concurrent refreshes into one network call
//! - Clearing every credential when refresh cannot succeed

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::credentials::json_id_to_string;
use crate::models::{AuthState, LoginRequest, TokenResponse};
use crate::services::single_flight::SingleFlight;
use crate::services::token_store::TokenStore;
use crate::time_utils::now_ms;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Owns the durable credentials and the refresh coordinator.
///
/// Cheap to clone; clones share the same in-flight refresh.
#[derive(Clone)]
pub struct AuthTokenManager {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    http: reqwest::Client,
    tokens: TokenStore,
    login_url: String,
    refresh_url: Option<String>,
    refresh_margin_ms: i64,
    refresh_flight: SingleFlight<Option<String>>,
}

impl AuthTokenManager {
    pub fn new(http: reqwest::Client, tokens: TokenStore, config: &Config) -> Self {
        Self::with_coordinator(http, tokens, config, SingleFlight::new())
    }

    /// Create a manager around an explicit refresh coordinator.
    pub fn with_coordinator(
        http: reqwest::Client,
        tokens: TokenStore,
        config: &Config,
        refresh_flight: SingleFlight<Option<String>>,
    ) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                http,
                tokens,
                login_url: config.login_url.clone(),
                refresh_url: config.refresh_url.clone(),
                refresh_margin_ms: config.token_refresh_margin.num_milliseconds(),
                refresh_flight,
            }),
        }
    }

    /// Return a usable access token, refreshing if the stored one is stale.
    pub async fn get_valid_token(&self) -> Option<String> {
        match self.inner.tokens.load() {
            Ok(stored) => {
                if let Some(access) = stored.access {
                    if access.is_valid_at(now_ms(), self.inner.refresh_margin_ms) {
                        return Some(access.token);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to read stored credentials"),
        }

        self.refresh().await
    }

    /// Refresh the access token, joining a refresh already in progress.
    ///
    /// Any failure logs the user out and yields `None`.
    pub async fn refresh(&self) -> Option<String> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .refresh_flight
            .run(move || async move { inner.perform_refresh().await })
            .await
    }

    /// Whether a refresh is currently running.
    pub fn is_refresh_in_flight(&self) -> bool {
        self.inner.refresh_flight.is_in_flight()
    }

    /// Exchange username/password for credentials and store them.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthState> {
        let response = self
            .inner
            .http
            .post(&self.inner.login_url)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SyncError::AuthFailure("Invalid credentials".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Malformed(format!("Login response: {}", e)))?;

        let meta_user = body
            .meta
            .as_ref()
            .and_then(|meta| json_id_to_string(&meta.user_id));

        let credentials = body.into_credentials(now_ms(), None).ok_or_else(|| {
            SyncError::AuthFailure("Login response missing token fields".to_string())
        })?;
        self.inner.tokens.save(&credentials)?;

        tracing::info!(user_id = ?meta_user, "Logged in");
        Ok(self.auth_state())
    }

    /// Forget every stored credential.
    pub fn logout(&self) {
        self.inner.logout();
    }

    /// Derive the current authentication state from stored credentials.
    pub fn auth_state(&self) -> AuthState {
        let stored = self.inner.tokens.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read stored credentials");
            Default::default()
        });
        let now = now_ms();

        let access = stored.access.filter(|t| t.is_valid_at(now, 0));
        let refresh_valid = stored.refresh.is_some_and(|t| t.is_valid_at(now, 0));
        if access.is_none() && !refresh_valid {
            return AuthState::default();
        }

        // Identity is best-effort: an undecodable token still counts as a session.
        let identity = access
            .as_ref()
            .and_then(|t| decode_identity(&t.token))
            .unwrap_or_default();

        AuthState {
            is_authenticated: true,
            user_id: identity.user_id(),
            user_type: identity.user_type,
            email: identity.email,
        }
    }
}

impl AuthInner {
    async fn perform_refresh(&self) -> Option<String> {
        let stored = match self.tokens.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read credentials for refresh");
                self.logout();
                return None;
            }
        };

        let now = now_ms();
        let Some(refresh) = stored.refresh.filter(|t| t.is_valid_at(now, 0)) else {
            tracing::info!("No valid refresh token, logging out");
            self.logout();
            return None;
        };

        let Some(refresh_url) = self.refresh_url.as_deref() else {
            tracing::warn!("Refresh endpoint not configured, logging out");
            self.logout();
            return None;
        };

        let response = match self
            .http
            .post(refresh_url)
            .bearer_auth(&refresh.token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh request failed");
                self.logout();
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Token refresh rejected");
            self.logout();
            return None;
        }

        let body: TokenResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh response unparseable");
                self.logout();
                return None;
            }
        };

        let Some(credentials) = body.into_credentials(now, Some(refresh.expires_at_ms)) else {
            tracing::warn!("Token refresh response missing token fields");
            self.logout();
            return None;
        };

        if let Err(e) = self.tokens.save(&credentials) {
            // The new token is still good for this session.
            tracing::error!(error = %e, "Failed to persist refreshed credentials");
        }

        tracing::info!("Access token refreshed");
        Some(credentials.access_token)
    }

    fn logout(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "Failed to clear stored credentials");
        }
    }
}

/// Identity claims we read from the token payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityClaims {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    user_type: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl IdentityClaims {
    fn user_id(&self) -> Option<String> {
        self.user_id
            .as_ref()
            .or(self.sub.as_ref())
            .and_then(json_id_to_string)
    }
}

/// Read identity claims without verifying the signature.
///
/// The server verifies tokens; the client only needs the claims for display
/// and ownership checks.
fn decode_identity(token: &str) -> Option<IdentityClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match decode::<IdentityClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "Access token payload not decodable");
            None
        }
    }
}
