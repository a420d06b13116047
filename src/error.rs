// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync error types shared by the auth, queue and controller layers.

/// Error type for every fallible sync operation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// True for failures that a later retry over the network may resolve.
    ///
    /// Saves failing this way are queued offline instead of being dropped.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Http { .. } | SyncError::Unauthorized
        )
    }

    /// HTTP status carried by the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Http { status, .. } => Some(*status),
            SyncError::Unauthorized => Some(401),
            SyncError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Malformed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
