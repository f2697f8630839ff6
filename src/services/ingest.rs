// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity ingestion.
//!
//! Each call pulls exactly one page of an athlete's history and moves the
//! stored cursor forward by one page, so draining a long history takes
//! repeated calls and stays well inside Strava's rate limits.

use crate::db::Database;
use crate::error::AppError;
use crate::models::Account;
use crate::services::strava::{ActivitySource, TokenEndpoint};
use crate::services::token::TokenManager;
use serde::Serialize;

/// What one `fetch_page` call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOutcome {
    /// The account with its cursor advanced
    #[serde(skip)]
    pub account: Account,
    /// Page that was requested
    pub page: u32,
    /// Entries returned by Strava
    pub fetched: usize,
    /// Entries with usable coordinates
    pub kept: usize,
    /// Rows that were new to the store
    pub inserted: usize,
}

impl PageOutcome {
    /// An empty page marks the end of the athlete's history.
    pub fn is_exhausted(&self) -> bool {
        self.fetched == 0
    }
}

/// Pulls activity pages into the store.
pub struct ActivityIngestor<'a, S> {
    source: &'a S,
    db: &'a Database,
    page_size: u32,
}

impl<'a, S: ActivitySource + Sync> ActivityIngestor<'a, S> {
    pub fn new(source: &'a S, db: &'a Database, page_size: u32) -> Self {
        Self {
            source,
            db,
            page_size,
        }
    }

    /// Fetch the page at the account's cursor using its access token.
    ///
    /// Entries without start coordinates are discarded; the rest are inserted
    /// if absent. The cursor advances by one page after any successful listing
    /// call, including an empty or fully filtered page. On failure nothing is
    /// written and the cursor stays put.
    pub async fn fetch_page(&self, account: Account) -> Result<PageOutcome, AppError> {
        let athlete_id = account.athlete_id;
        let page = account.next_page;

        let summaries = self
            .source
            .list_activities(&account.access_token, page, self.page_size)
            .await?;
        let fetched = summaries.len();

        let mut activities = Vec::with_capacity(fetched);
        for summary in summaries {
            match summary.into_activity(athlete_id) {
                Ok(Some(activity)) => activities.push(activity),
                Ok(None) => {}
                Err(e) => tracing::warn!(athlete_id, page, error = %e, "Skipping listing entry"),
            }
        }
        let kept = activities.len();

        let inserted = self.db.insert_activities(&activities)?;

        let next_page = page.saturating_add(1);
        self.db.set_next_page(athlete_id, next_page)?;

        tracing::info!(
            athlete_id,
            page,
            fetched,
            kept,
            inserted,
            "Activity page ingested"
        );

        Ok(PageOutcome {
            account: Account {
                next_page,
                ..account
            },
            page,
            fetched,
            kept,
            inserted,
        })
    }
}

/// Totals for one pass over every stored account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    pub accounts: usize,
    /// Accounts without a usable token this round
    pub skipped: usize,
    /// Accounts whose page fetch failed
    pub failed: usize,
    /// Accounts whose history is exhausted
    pub exhausted: usize,
    pub inserted: usize,
}

/// Fetch one page for every stored account.
///
/// Accounts without a valid token are skipped and a failing account does not
/// stop the others.
pub async fn sync_all_accounts<E, S>(
    tokens: &TokenManager<'_, E>,
    ingestor: &ActivityIngestor<'_, S>,
    db: &Database,
) -> Result<SyncSummary, AppError>
where
    E: TokenEndpoint + Sync,
    S: ActivitySource + Sync,
{
    let accounts = db.list_accounts()?;
    let mut summary = SyncSummary {
        accounts: accounts.len(),
        ..SyncSummary::default()
    };

    for account in accounts {
        let Some(account) = tokens.get_valid_token(account).await else {
            summary.skipped += 1;
            continue;
        };

        let athlete_id = account.athlete_id;
        match ingestor.fetch_page(account).await {
            Ok(outcome) => {
                summary.inserted += outcome.inserted;
                if outcome.is_exhausted() {
                    summary.exhausted += 1;
                }
            }
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "Activity fetch failed");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        accounts = summary.accounts,
        skipped = summary.skipped,
        failed = summary.failed,
        inserted = summary.inserted,
        "Activity sync finished"
    );
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::tests::test_db;
    use crate::db::tables;
    use crate::services::strava::{StravaActivitySummary, TokenGrant};
    use crate::services::token::tests::FakeTokenEndpoint;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves queued pages in order; an empty queue yields empty pages.
    pub(crate) struct FakeActivitySource {
        pages: Mutex<VecDeque<Result<Vec<StravaActivitySummary>, AppError>>>,
        pub requested: Mutex<Vec<(String, u32, u32)>>,
    }

    impl FakeActivitySource {
        pub(crate) fn new(pages: Vec<Result<Vec<StravaActivitySummary>, AppError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    impl ActivitySource for FakeActivitySource {
        async fn list_activities(
            &self,
            access_token: &str,
            page: u32,
            per_page: u32,
        ) -> Result<Vec<StravaActivitySummary>, AppError> {
            self.requested
                .lock()
                .unwrap()
                .push((access_token.to_string(), page, per_page));
            self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    pub(crate) fn summaries(ids: std::ops::Range<u64>) -> Vec<StravaActivitySummary> {
        ids.map(|id| StravaActivitySummary {
            id: Some(id),
            name: Some(format!("Run {}", id)),
            start_date_local: Some("2024-05-01T07:30:00Z".to_string()),
            distance: Some(1000.0 * id as f64),
            moving_time: Some(600),
            activity_type: Some("Run".to_string()),
            start_latlng: Some(vec![42.28, -83.74]),
            ..StravaActivitySummary::default()
        })
        .collect()
    }

    fn stored_account(db: &Database) -> Account {
        let account = Account::new(42, "token".into(), "refresh".into(), i64::MAX);
        db.upsert_account(&account).unwrap();
        account
    }

    #[tokio::test]
    async fn test_two_pages_then_exhaustion() {
        let (_dir, db) = test_db();
        let account = stored_account(&db);
        let source = FakeActivitySource::new(vec![Ok(summaries(1..26)), Ok(Vec::new())]);
        let ingestor = ActivityIngestor::new(&source, &db, 25);

        let first = ingestor.fetch_page(account).await.unwrap();
        assert_eq!(first.inserted, 25);
        assert!(!first.is_exhausted());

        let second = ingestor.fetch_page(first.account).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert!(second.is_exhausted());

        assert_eq!(db.count(tables::ACTIVITIES).unwrap(), 25);
        assert_eq!(db.get_account(42).unwrap().unwrap().next_page, 3);

        let requested = source.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec![("token".to_string(), 1, 25), ("token".to_string(), 2, 25)]
        );
    }

    #[tokio::test]
    async fn test_reingesting_same_page_creates_no_duplicates() {
        let (_dir, db) = test_db();
        let account = stored_account(&db);
        let source = FakeActivitySource::new(vec![Ok(summaries(1..4)), Ok(summaries(1..4))]);
        let ingestor = ActivityIngestor::new(&source, &db, 25);

        let first = ingestor.fetch_page(account.clone()).await.unwrap();
        let again = ingestor.fetch_page(account).await.unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(again.inserted, 0);
        assert_eq!(again.fetched, 3);
        assert_eq!(db.count(tables::ACTIVITIES).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_filtered_page_still_advances_cursor() {
        let (_dir, db) = test_db();
        let account = stored_account(&db);
        let mut page = summaries(1..3);
        page[0].start_latlng = Some(vec![]);
        page[1].start_latlng = None;
        let source = FakeActivitySource::new(vec![Ok(page)]);
        let ingestor = ActivityIngestor::new(&source, &db, 25);

        let outcome = ingestor.fetch_page(account).await.unwrap();
        assert_eq!((outcome.fetched, outcome.kept, outcome.inserted), (2, 0, 0));
        assert_eq!(outcome.account.next_page, 2);
        assert_eq!(db.get_account(42).unwrap().unwrap().next_page, 2);
    }

    #[tokio::test]
    async fn test_failed_listing_keeps_cursor() {
        let (_dir, db) = test_db();
        let account = stored_account(&db);
        let source =
            FakeActivitySource::new(vec![Err(AppError::StravaApi("HTTP 500".to_string()))]);
        let ingestor = ActivityIngestor::new(&source, &db, 25);

        assert!(ingestor.fetch_page(account).await.is_err());
        assert_eq!(db.get_account(42).unwrap().unwrap().next_page, 1);
        assert_eq!(db.count(tables::ACTIVITIES).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_all_accounts_skips_unrefreshable_accounts() {
        let (_dir, db) = test_db();
        stored_account(&db);
        db.upsert_account(&Account::new(7, "stale".into(), "bad".into(), 0))
            .unwrap();

        let endpoint = FakeTokenEndpoint::returning(None::<TokenGrant>);
        let source = FakeActivitySource::new(vec![Ok(summaries(1..6))]);
        let tokens = TokenManager::new(&endpoint, &db);
        let ingestor = ActivityIngestor::new(&source, &db, 25);

        let summary = sync_all_accounts(&tokens, &ingestor, &db).await.unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                accounts: 2,
                skipped: 1,
                failed: 0,
                exhausted: 0,
                inserted: 5,
            }
        );
        assert_eq!(db.get_account(7).unwrap().unwrap().next_page, 1);
    }
}
