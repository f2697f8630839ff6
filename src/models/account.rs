// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account model: one authorized Strava athlete.

use serde::{Deserialize, Serialize};

/// First page of the activity listing; Strava pages are 1-based.
pub const FIRST_PAGE: u32 = 1;

/// OAuth credentials and ingestion cursor for one athlete.
///
/// Passed by value into the token manager and ingestor, which hand back the
/// updated record after persisting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Strava athlete ID (primary key)
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
    /// Next listing page to request
    pub next_page: u32,
}

impl Account {
    /// A freshly authorized account, starting at the first page.
    pub fn new(
        athlete_id: u64,
        access_token: String,
        refresh_token: String,
        expires_at: i64,
    ) -> Self {
        Self {
            athlete_id,
            access_token,
            refresh_token,
            expires_at,
            next_page: FIRST_PAGE,
        }
    }
}
