// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format Unix seconds as RFC3339, or the raw number if out of range.
pub fn format_unix_seconds(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(format_utc_rfc3339)
        .unwrap_or_else(|| secs.to_string())
}

/// Parse an activity timestamp into Unix seconds.
///
/// Accepts RFC3339 (Strava's `start_date_local` carries a bare `Z` even though
/// it is wall-clock time) and offset-less `YYYY-MM-DD[T ]HH:MM:SS`, which is
/// read as UTC.
pub fn parse_unix_seconds(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().timestamp())
}

/// Whether a token expiring at `expires_at` (Unix seconds) is unusable at `now`.
pub fn is_expired(expires_at: i64, now: DateTime<Utc>) -> bool {
    now.timestamp() >= expires_at
}
