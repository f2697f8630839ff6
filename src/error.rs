// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Weather API error: {0}")]
    WeatherApi(String),

    #[error("Malformed {endpoint} payload: {detail}")]
    MalformedPayload {
        endpoint: &'static str,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message carried by `StravaApi`/`WeatherApi` when the upstream answered 429.
    pub const RATE_LIMITED: &'static str = "Rate limit exceeded";

    pub fn malformed(endpoint: &'static str, detail: impl Into<String>) -> Self {
        AppError::MalformedPayload {
            endpoint,
            detail: detail.into(),
        }
    }

    /// True when an upstream API rejected the call for rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AppError::StravaApi(msg) | AppError::WeatherApi(msg) => msg == Self::RATE_LIMITED,
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Report(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Report(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Authorization(msg) => {
                (StatusCode::UNAUTHORIZED, "authorization_failed", Some(msg.clone()))
            }
            AppError::TokenRefresh(msg) => {
                (StatusCode::BAD_GATEWAY, "token_refresh_failed", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::WeatherApi(msg) => {
                (StatusCode::BAD_GATEWAY, "weather_error", Some(msg.clone()))
            }
            AppError::MalformedPayload { .. } => (
                StatusCode::BAD_GATEWAY,
                "malformed_payload",
                Some(self.to_string()),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Report(msg) => {
                tracing::error!(error = %msg, "Report error");
                (StatusCode::INTERNAL_SERVER_ERROR, "report_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
