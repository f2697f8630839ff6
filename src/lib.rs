// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-Weather: correlate Strava activities with historical weather.
//!
//! This crate provides the web app that authorizes Strava athletes, ingests
//! their activities page by page, attaches OpenWeather history to each one
//! and renders CSV and chart reports.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{http_client, ReportGenerator, StravaClient, WeatherClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub strava: StravaClient,
    pub weather: WeatherClient,
    pub reports: ReportGenerator,
}

impl AppState {
    /// Open the database and build the API clients described by `config`.
    pub fn new(config: Config) -> error::Result<Self> {
        let db = Database::open(&config.database_path)?;
        let http = http_client(config.http_timeout_secs)?;
        Ok(Self {
            strava: StravaClient::new(http.clone(), &config),
            weather: WeatherClient::new(http, &config),
            reports: ReportGenerator::new(&config.reports_dir),
            db,
            config,
        })
    }
}
