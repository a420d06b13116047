// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for epoch timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Issuer timestamps below this are seconds, not milliseconds.
const EPOCH_MS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Normalize an issuer expiry (seconds or milliseconds, possibly
/// fractional) to absolute epoch milliseconds.
pub fn normalize_epoch_ms(value: f64) -> i64 {
    let ms = if value < EPOCH_MS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    // `as` saturates at the i64 bounds.
    ms.round() as i64
}

/// Format epoch milliseconds as RFC3339 using a `Z` suffix (for logs/CLI).
pub fn format_epoch_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}
