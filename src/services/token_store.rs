// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential persistence on top of the durable key-value store.
//!
//! Four entries are kept: access token, refresh token and both expiries.
//! The access token entry expires with the access token; the other three
//! live as long as the refresh token.

use crate::error::Result;
use crate::models::{Credentials, ExpiringToken, StoredCredentials};
use crate::store::{keys, KeyValueStore, StoreEntry};
use std::sync::Arc;

#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read whatever credentials are currently stored.
    ///
    /// Unparseable expiries are treated as absent tokens.
    pub fn load(&self) -> Result<StoredCredentials> {
        Ok(StoredCredentials {
            access: self.read_token(keys::ACCESS_TOKEN, keys::ACCESS_TOKEN_EXPIRY)?,
            refresh: self.read_token(keys::REFRESH_TOKEN, keys::REFRESH_TOKEN_EXPIRY)?,
        })
    }

    fn read_token(&self, token_key: &str, expiry_key: &str) -> Result<Option<ExpiringToken>> {
        let Some(token) = self.store.get(token_key)? else {
            return Ok(None);
        };
        let expires_at_ms = self
            .store
            .get(expiry_key)?
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        Ok(expires_at_ms.map(|expires_at_ms| ExpiringToken {
            token,
            expires_at_ms,
        }))
    }

    /// Write all four entries as one batch.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let refresh_exp = Some(credentials.refresh_token_expiry_ms);
        self.store.set_many(&[
            StoreEntry::new(
                keys::ACCESS_TOKEN,
                credentials.access_token.as_str(),
                Some(credentials.access_token_expiry_ms),
            ),
            StoreEntry::new(
                keys::ACCESS_TOKEN_EXPIRY,
                credentials.access_token_expiry_ms.to_string(),
                refresh_exp,
            ),
            StoreEntry::new(
                keys::REFRESH_TOKEN,
                credentials.refresh_token.as_str(),
                refresh_exp,
            ),
            StoreEntry::new(
                keys::REFRESH_TOKEN_EXPIRY,
                credentials.refresh_token_expiry_ms.to_string(),
                refresh_exp,
            ),
        ])
    }

    /// Remove every credential entry.
    pub fn clear(&self) -> Result<()> {
        self.store.delete_many(&[
            keys::ACCESS_TOKEN,
            keys::ACCESS_TOKEN_EXPIRY,
            keys::REFRESH_TOKEN,
            keys::REFRESH_TOKEN_EXPIRY,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::time_utils::now_ms;

    fn credentials(access_exp: i64, refresh_exp: i64) -> Credentials {
        Credentials {
            access_token: "access".to_string(),
            access_token_expiry_ms: access_exp,
            refresh_token: "refresh".to_string(),
            refresh_token_expiry_ms: refresh_exp,
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        let now = now_ms();
        tokens.save(&credentials(now + 60_000, now + 600_000)).unwrap();

        let loaded = tokens.load().unwrap();
        assert_eq!(loaded.access.unwrap().token, "access");
        assert_eq!(loaded.refresh.unwrap().expires_at_ms, now + 600_000);
    }

    #[test]
    fn test_access_entry_expires_before_refresh() {
        let tokens = TokenStore::new(Arc::new(MemoryStore::new()));
        let now = now_ms();
        tokens.save(&credentials(now - 1, now + 600_000)).unwrap();

        let loaded = tokens.load().unwrap();
        assert!(loaded.access.is_none());
        assert_eq!(loaded.refresh.unwrap().token, "refresh");
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(store.clone());
        let now = now_ms();
        tokens.save(&credentials(now + 60_000, now + 600_000)).unwrap();

        tokens.clear().unwrap();
        assert_eq!(tokens.load().unwrap(), StoredCredentials::default());
        assert!(store.keys_with_prefix("diagram_sync.").unwrap().is_empty());
    }
}
