// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pipeline stage routes: activity ingestion and weather enrichment.
//!
//! Each stage runs to completion inside its request, flashes a summary and
//! redirects back to the landing page.

use axum::{extract::State, response::Redirect, routing::get, Router};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::models::ReportGrouping;
use crate::routes::pages::{push_flash, FlashLevel};
use crate::services::{
    sync_all_accounts, ActivityIngestor, EnrichSummary, ReportOutcome, SyncSummary, TokenManager,
    WeatherEnricher,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(fetch_activities))
        .route("/process_weather", get(process_weather))
}

fn sync_message(summary: &SyncSummary) -> (FlashLevel, String) {
    if summary.accounts == 0 {
        return (
            FlashLevel::Info,
            "No authorized athletes yet. Authorize with Strava first.".to_string(),
        );
    }

    let mut message = format!(
        "Activities fetched: {} new from {} athlete(s).",
        summary.inserted, summary.accounts
    );
    if summary.exhausted > 0 {
        message.push_str(&format!(" {} history complete.", summary.exhausted));
    }
    if summary.skipped > 0 {
        message.push_str(&format!(" {} skipped (token refresh failed).", summary.skipped));
    }
    if summary.failed > 0 {
        message.push_str(&format!(" {} failed.", summary.failed));
    }

    let level = if summary.failed > 0 || summary.skipped > 0 {
        FlashLevel::Danger
    } else {
        FlashLevel::Success
    };
    (level, message)
}

fn weather_message(summary: &EnrichSummary) -> (FlashLevel, String) {
    let mut message = format!(
        "Weather processed: {} observed, {} skipped, {} failed.",
        summary.observed, summary.skipped, summary.failed
    );
    if summary.deferred > 0 {
        message.push_str(&format!(
            " Weather API rate limit reached, {} left for the next run.",
            summary.deferred
        ));
    }
    let level = if summary.failed > 0 {
        FlashLevel::Danger
    } else {
        FlashLevel::Success
    };
    (level, message)
}

/// Fetch one page of activities for every stored athlete.
async fn fetch_activities(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let tokens = TokenManager::new(&state.strava, &state.db);
    let ingestor = ActivityIngestor::new(&state.strava, &state.db, state.config.activity_page_size);

    let jar = match sync_all_accounts(&tokens, &ingestor, &state.db).await {
        Ok(summary) => {
            let (level, message) = sync_message(&summary);
            push_flash(jar, level, message)
        }
        Err(e) => {
            tracing::error!(error = %e, "Activity sync failed");
            push_flash(jar, FlashLevel::Danger, format!("Error fetching activities: {}", e))
        }
    };
    (jar, Redirect::to("/"))
}

/// Attach weather to pending activities, then export the CSV summaries.
async fn process_weather(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let enricher = WeatherEnricher::new(&state.weather, &state.db);
    let summary = match enricher.enrich_pending().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Weather enrichment failed");
            let jar = push_flash(
                jar,
                FlashLevel::Danger,
                format!("Error processing weather data: {}", e),
            );
            return (jar, Redirect::to("/"));
        }
    };

    let (level, message) = weather_message(&summary);
    let jar = push_flash(jar, level, message);

    let jar = match state.reports.export_csv(&state.db, ReportGrouping::default()) {
        Ok(ReportOutcome::Generated(artifacts)) => push_flash(
            jar,
            FlashLevel::Success,
            format!("{} CSV summaries exported.", artifacts.csv_paths.len()),
        ),
        Ok(ReportOutcome::NoData) => push_flash(
            jar,
            FlashLevel::Info,
            "No activities with weather yet, nothing to export.",
        ),
        Err(e) => {
            tracing::error!(error = %e, "CSV export failed");
            push_flash(jar, FlashLevel::Danger, format!("Error exporting CSV files: {}", e))
        }
    };

    (jar, Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_message() {
        let (level, msg) = sync_message(&SyncSummary::default());
        assert_eq!(level, FlashLevel::Info);
        assert!(msg.contains("Authorize with Strava"));

        let (level, msg) = sync_message(&SyncSummary {
            accounts: 2,
            skipped: 0,
            failed: 0,
            exhausted: 1,
            inserted: 25,
        });
        assert_eq!(level, FlashLevel::Success);
        assert_eq!(msg, "Activities fetched: 25 new from 2 athlete(s). 1 history complete.");

        let (level, msg) = sync_message(&SyncSummary {
            accounts: 1,
            skipped: 1,
            ..SyncSummary::default()
        });
        assert_eq!(level, FlashLevel::Danger);
        assert!(msg.contains("1 skipped"));
    }

    #[test]
    fn test_weather_message() {
        let (level, msg) = weather_message(&EnrichSummary {
            observed: 2,
            skipped: 1,
            ..EnrichSummary::default()
        });
        assert_eq!(level, FlashLevel::Success);
        assert_eq!(msg, "Weather processed: 2 observed, 1 skipped, 0 failed.");

        let (level, msg) = weather_message(&EnrichSummary {
            failed: 1,
            deferred: 4,
            ..EnrichSummary::default()
        });
        assert_eq!(level, FlashLevel::Danger);
        assert!(msg.ends_with("rate limit reached, 4 left for the next run."));
    }
}
