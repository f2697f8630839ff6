// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod charts;
pub mod ingest;
pub mod report;
pub mod strava;
pub mod token;
pub mod weather;

pub use ingest::{sync_all_accounts, ActivityIngestor, PageOutcome, SyncSummary};
pub use report::{ReportArtifacts, ReportGenerator, ReportOutcome};
pub use strava::{http_client, ActivitySource, StravaClient, TokenEndpoint};
pub use token::TokenManager;
pub use weather::{EnrichOutcome, EnrichSummary, WeatherClient, WeatherEnricher, WeatherSource};
