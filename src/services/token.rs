// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle for stored accounts.

use crate::db::Database;
use crate::error::AppError;
use crate::models::Account;
use crate::services::strava::TokenEndpoint;
use crate::time_utils::{format_unix_seconds, is_expired};
use chrono::{DateTime, Utc};

/// Keeps account tokens usable: hands back the stored token while it is
/// fresh, otherwise refreshes it with the provider and persists the result.
pub struct TokenManager<'a, E> {
    endpoint: &'a E,
    db: &'a Database,
}

impl<'a, E: TokenEndpoint + Sync> TokenManager<'a, E> {
    pub fn new(endpoint: &'a E, db: &'a Database) -> Self {
        Self { endpoint, db }
    }

    /// Complete an authorization: exchange the code and store the account.
    ///
    /// Re-authorizing an existing athlete replaces its tokens and restarts
    /// ingestion from the first page.
    pub async fn authorize(&self, code: &str) -> Result<Account, AppError> {
        if code.trim().is_empty() {
            return Err(AppError::Authorization(
                "No authorization code received".to_string(),
            ));
        }

        let grant = self.endpoint.exchange_code(code).await?;
        let athlete_id = grant.athlete_id.ok_or_else(|| {
            AppError::malformed("strava token", "code exchange without athlete.id")
        })?;

        let account = Account::new(
            athlete_id,
            grant.access_token,
            grant.refresh_token,
            grant.expires_at,
        );
        self.db.upsert_account(&account)?;

        tracing::info!(
            athlete_id,
            expires_at = %format_unix_seconds(account.expires_at),
            "Account authorized and stored"
        );
        Ok(account)
    }

    /// Return `account` unchanged if its token is still valid at `now`,
    /// otherwise refresh, persist and return the updated record.
    ///
    /// On any failure the stored account is left untouched.
    pub async fn refresh_if_expired(
        &self,
        account: Account,
        now: DateTime<Utc>,
    ) -> Result<Account, AppError> {
        if !is_expired(account.expires_at, now) {
            return Ok(account);
        }

        tracing::info!(athlete_id = account.athlete_id, "Access token expired, refreshing");

        let grant = self
            .endpoint
            .refresh_token(&account.refresh_token)
            .await
            .map_err(|e| AppError::TokenRefresh(e.to_string()))?;

        let refreshed = Account {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
            ..account
        };
        self.db.update_tokens(&refreshed)?;

        tracing::info!(
            athlete_id = refreshed.athlete_id,
            expires_at = %format_unix_seconds(refreshed.expires_at),
            "Token refreshed"
        );
        Ok(refreshed)
    }

    /// Account with a usable access token, or `None` if the refresh failed.
    ///
    /// `None` means "skip this account this round"; the failure is logged.
    pub async fn get_valid_token(&self, account: Account) -> Option<Account> {
        let athlete_id = account.athlete_id;
        match self.refresh_if_expired(account, Utc::now()).await {
            Ok(account) => Some(account),
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "No valid token, skipping account");
                None
            }
        }
    }
}
