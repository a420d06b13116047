// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer credentials and the identity derived from them.

use crate::time_utils::normalize_epoch_ms;
use serde::{Deserialize, Serialize};

/// Refresh-token lifetime assumed when the issuer omits `refreshTokenExp`
/// and no earlier expiry is known (7 days).
pub const DEFAULT_REFRESH_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Full credential set. Expiries are absolute epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub access_token_expiry_ms: i64,
    pub refresh_token: String,
    pub refresh_token_expiry_ms: i64,
}

/// A single stored token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringToken {
    pub token: String,
    pub expires_at_ms: i64,
}

impl ExpiringToken {
    /// Valid if it expires more than `margin_ms` after `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64, margin_ms: i64) -> bool {
        now_ms + margin_ms < self.expires_at_ms
    }
}

/// Whatever part of the credential set is currently in durable storage.
///
/// The access token entry expires from the store before the refresh token does,
/// so either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access: Option<ExpiringToken>,
    pub refresh: Option<ExpiringToken>,
}

/// Token response from both the login and the refresh endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub refresh_token_exp: Option<f64>,
    #[serde(default)]
    pub meta: Option<TokenMeta>,
}

/// Identity metadata returned alongside tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMeta {
    #[serde(default)]
    pub user_id: serde_json::Value,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenResponse {
    /// Convert to a complete credential set.
    ///
    /// Returns `None` when the access token, refresh token or access expiry
    /// is missing. A missing refresh expiry falls back to
    /// `previous_refresh_expiry_ms`, then to `now_ms + DEFAULT_REFRESH_TTL_MS`.
    pub fn into_credentials(
        self,
        now_ms: i64,
        previous_refresh_expiry_ms: Option<i64>,
    ) -> Option<Credentials> {
        let access_token = self.token.filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty())?;
        let access_token_expiry_ms = normalize_epoch_ms(self.exp?);
        let refresh_token_expiry_ms = self
            .refresh_token_exp
            .map(normalize_epoch_ms)
            .or(previous_refresh_expiry_ms)
            .unwrap_or(now_ms + DEFAULT_REFRESH_TTL_MS);

        Some(Credentials {
            access_token,
            access_token_expiry_ms,
            refresh_token,
            refresh_token_expiry_ms,
        })
    }
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Read-only view of the current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub email: Option<String>,
}

/// `GET /auth/me` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub user_type: Option<String>,
}

impl MeResponse {
    pub fn user_id(&self) -> Option<String> {
        self.user_id.as_ref().and_then(json_id_to_string)
    }
}

/// Render a JSON id (string or number) as a string.
pub fn json_id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> TokenResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_into_credentials_normalizes_seconds() {
        let creds = response(serde_json::json!({
            "token": "a",
            "refreshToken": "r",
            "exp": 1_700_000_000,
            "refreshTokenExp": 1_700_600_000_000i64,
        }))
        .into_credentials(0, None)
        .unwrap();

        assert_eq!(creds.access_token_expiry_ms, 1_700_000_000_000);
        assert_eq!(creds.refresh_token_expiry_ms, 1_700_600_000_000);
    }

    #[test]
    fn test_into_credentials_accepts_fractional_expiry() {
        let creds = response(serde_json::json!({
            "token": "a",
            "refreshToken": "r",
            "exp": 1.7e9,
            "refreshTokenExp": 1_700_600_000.5,
        }))
        .into_credentials(0, None)
        .unwrap();

        assert_eq!(creds.access_token_expiry_ms, 1_700_000_000_000);
        assert_eq!(creds.refresh_token_expiry_ms, 1_700_600_000_500);
    }

    #[test]
    fn test_into_credentials_requires_all_fields() {
        let missing_refresh = response(serde_json::json!({ "token": "a", "exp": 1 }));
        assert!(missing_refresh.into_credentials(0, None).is_none());

        let empty_token = response(serde_json::json!({
            "token": "",
            "refreshToken": "r",
            "exp": 1,
        }));
        assert!(empty_token.into_credentials(0, None).is_none());

        let missing_exp = response(serde_json::json!({ "token": "a", "refreshToken": "r" }));
        assert!(missing_exp.into_credentials(0, None).is_none());
    }

    #[test]
    fn test_refresh_expiry_fallbacks() {
        let body = serde_json::json!({ "token": "a", "refreshToken": "r", "exp": 1_700_000_000 });

        let kept = response(body.clone())
            .into_credentials(5, Some(1_800_000_000_000))
            .unwrap();
        assert_eq!(kept.refresh_token_expiry_ms, 1_800_000_000_000);

        let defaulted = response(body).into_credentials(5, None).unwrap();
        assert_eq!(defaulted.refresh_token_expiry_ms, 5 + DEFAULT_REFRESH_TTL_MS);
    }

    #[test]
    fn test_json_id_to_string() {
        assert_eq!(json_id_to_string(&serde_json::json!(42)), Some("42".to_string()));
        assert_eq!(json_id_to_string(&serde_json::json!("u-1")), Some("u-1".to_string()));
        assert_eq!(json_id_to_string(&serde_json::json!(null)), None);
    }
}
