// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local runs.

use std::env;
use std::path::PathBuf;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// OpenWeather API key
    pub openweather_api_key: String,
    /// HMAC key used to sign the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    /// Externally visible base URL, used to build the OAuth redirect URI
    pub public_url: String,
    /// Server port
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory for generated CSV and chart files
    pub reports_dir: PathBuf,
    /// Activities requested per ingestion page
    pub activity_page_size: u32,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,

    /// Strava OAuth base (authorize + token endpoints)
    pub strava_oauth_url: String,
    /// Strava REST API base
    pub strava_api_url: String,
    /// OpenWeather One Call base
    pub openweather_url: String,
}

pub const DEFAULT_STRAVA_OAUTH_URL: &str = "https://www.strava.com/oauth";
pub const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";
pub const DEFAULT_PAGE_SIZE: u32 = 200;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        let activity_page_size = match env::var("ACTIVITY_PAGE_SIZE") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=200).contains(n))
                .ok_or(ConfigError::Invalid("ACTIVITY_PAGE_SIZE"))?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            openweather_api_key: env::var("OPENWEATHER_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OPENWEATHER_API_KEY"))?,
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://127.0.0.1:{}", port)),
            port,
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("activities.db")),
            reports_dir: env::var("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            activity_page_size,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_OAUTH_URL.to_string()),
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_URL.to_string()),
            openweather_url: env::var("OPENWEATHER_URL")
                .unwrap_or_else(|_| DEFAULT_OPENWEATHER_URL.to_string()),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            openweather_api_key: "test_weather_key".to_string(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            public_url: "http://127.0.0.1:5000".to_string(),
            port: 5000,
            database_path: PathBuf::from("activities.db"),
            reports_dir: PathBuf::from("static"),
            activity_page_size: DEFAULT_PAGE_SIZE,
            http_timeout_secs: 5,
            strava_oauth_url: DEFAULT_STRAVA_OAUTH_URL.to_string(),
            strava_api_url: DEFAULT_STRAVA_API_URL.to_string(),
            openweather_url: DEFAULT_OPENWEATHER_URL.to_string(),
        }
    }

    /// Redirect URI registered with Strava for the OAuth callback.
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.public_url)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
