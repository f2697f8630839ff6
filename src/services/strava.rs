// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for OAuth and activity listing.
//!
//! Handles:
//! - Authorization-code and refresh-token exchanges
//! - Paginated activity listing
//! - Rate limit detection
//!
//! Responses deserialize into optional-field structs and are validated before
//! use, so a missing key surfaces as `AppError::MalformedPayload`.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Activity, LatLng};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const TOKEN_ENDPOINT: &str = "strava token";
const ACTIVITIES_ENDPOINT: &str = "strava activities";

/// Provider side of the OAuth token lifecycle.
pub trait TokenEndpoint {
    /// Exchange an authorization code for the first token triple.
    fn exchange_code(&self, code: &str)
        -> impl Future<Output = Result<TokenGrant, AppError>> + Send;

    /// Exchange a refresh token for a new token triple.
    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenGrant, AppError>> + Send;
}

/// Paginated activity listing.
pub trait ActivitySource {
    fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<StravaActivitySummary>, AppError>> + Send;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    oauth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            oauth_url: config.strava_oauth_url.trim_end_matches('/').to_string(),
            api_url: config.strava_api_url.trim_end_matches('/').to_string(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        }
    }

    /// Build the browser redirect that starts the authorization flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?\
             client_id={}&\
             response_type=code&\
             redirect_uri={}&\
             approval_prompt=force&\
             scope=read,activity:read_all&\
             state={}",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token request failed: {}", e)))?;

        check_response_json(response, TOKEN_ENDPOINT).await
    }
}

impl TokenEndpoint for StravaClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let tokens = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .await
            .map_err(|e| match e {
                AppError::StravaApi(msg) => AppError::Authorization(msg),
                other => other,
            })?;
        tokens.validate()
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, AppError> {
        let tokens = self
            .post_token_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        tokens.validate()
    }
}

impl ActivitySource for StravaClient {
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response, ACTIVITIES_ENDPOINT).await
    }
}

/// Build the shared HTTP client used for every outbound call.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!(endpoint, "Strava rate limit hit (429)");
            return Err(AppError::StravaApi(AppError::RATE_LIMITED.to_string()));
        }

        return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AppError::StravaApi(format!("Failed to read body: {}", e)))?;
    serde_json::from_slice(&body).map_err(|e| AppError::malformed(endpoint, e.to_string()))
}

/// Raw token response from Strava's `/oauth/token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    /// Present on the authorization-code exchange only.
    pub athlete: Option<AthleteRef>,
}

/// Minimal athlete reference embedded in token and activity payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteRef {
    pub id: Option<u64>,
}

/// A validated token triple.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete_id: Option<u64>,
}

impl TokenResponse {
    pub fn validate(self) -> Result<TokenGrant, AppError> {
        let missing = |key: &str| AppError::malformed(TOKEN_ENDPOINT, format!("missing {}", key));
        Ok(TokenGrant {
            access_token: self
                .access_token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("access_token"))?,
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("refresh_token"))?,
            expires_at: self.expires_at.ok_or_else(|| missing("expires_at"))?,
            athlete_id: self.athlete.and_then(|a| a.id),
        })
    }
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaActivitySummary {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub start_date_local: Option<String>,
    pub distance: Option<f64>,
    pub moving_time: Option<i64>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub sport_type: Option<String>,
    pub start_latlng: Option<Vec<f64>>,
}

impl StravaActivitySummary {
    /// Start coordinates, if the entry carries a usable pair.
    pub fn start_coordinates(&self) -> Option<LatLng> {
        match self.start_latlng.as_deref() {
            Some([lat, lng, ..]) => Some(LatLng {
                lat: *lat,
                lng: *lng,
            }),
            _ => None,
        }
    }

    /// Convert into a stored activity.
    ///
    /// Entries without coordinates yield `Ok(None)`; entries missing their ID
    /// or start time are malformed.
    pub fn into_activity(self, athlete_id: u64) -> Result<Option<Activity>, AppError> {
        let Some(start_latlng) = self.start_coordinates() else {
            return Ok(None);
        };
        let activity_id = self
            .id
            .ok_or_else(|| AppError::malformed(ACTIVITIES_ENDPOINT, "activity without id"))?;
        let start_date_local = self.start_date_local.ok_or_else(|| {
            AppError::malformed(
                ACTIVITIES_ENDPOINT,
                format!("activity {} without start_date_local", activity_id),
            )
        })?;

        Ok(Some(Activity {
            activity_id,
            athlete_id,
            name: self.name.unwrap_or_default(),
            start_date_local,
            start_date: self.start_date,
            distance_meters: self.distance.unwrap_or(0.0),
            moving_time_secs: self.moving_time.unwrap_or(0),
            activity_type: self
                .activity_type
                .or(self.sport_type)
                .unwrap_or_else(|| "Unknown".to_string()),
            start_latlng: Some(start_latlng),
        }))
    }
}
