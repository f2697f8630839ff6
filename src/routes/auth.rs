// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authorization routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::routes::pages::{push_flash, FlashLevel};
use crate::services::TokenManager;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed state stays valid, in milliseconds.
pub const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/callback", get(callback))
}

#[derive(Deserialize)]
pub struct AuthorizeParams {
    /// Local path to land on after authorization completes.
    #[serde(default)]
    return_to: Option<String>,
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Only same-site absolute paths are accepted as return targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Build the signed OAuth `state`: base64 of `return_to|timestamp_hex|signature_hex`.
pub fn sign_state(return_to: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", return_to, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify a state produced by [`sign_state`] and return its `return_to` path.
///
/// Rejects bad encodings, signature mismatches and states older than
/// [`STATE_MAX_AGE_MS`] (or from the future).
pub fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // return_to may not contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let return_to = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", return_to, timestamp_hex).as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if issued > now_ms || now_ms - issued > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(return_to.to_string())
}

/// Start OAuth flow - redirect to Strava authorization.
async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect> {
    let return_to = params
        .return_to
        .filter(|p| is_local_path(p) && !p.contains('|'))
        .unwrap_or_else(|| "/".to_string());

    let oauth_state = sign_state(&return_to, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state
        .strava
        .authorize_url(&state.config.redirect_uri(), &oauth_state);

    tracing::info!(
        client_id = %state.config.strava_client_id,
        return_to = %return_to,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code, store the account, flash the outcome.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let verified = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now_millis().ok()?));
    let Some(return_to) = verified else {
        tracing::warn!("Invalid or missing OAuth state");
        let jar = push_flash(
            jar,
            FlashLevel::Danger,
            "Failed to authorize with Strava: invalid or expired request",
        );
        return Ok((jar, Redirect::to("/")));
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let jar = push_flash(
            jar,
            FlashLevel::Danger,
            format!("Strava authorization was not granted: {}", error),
        );
        return Ok((jar, Redirect::to(&return_to)));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        let jar = push_flash(jar, FlashLevel::Danger, "No authorization code received");
        return Ok((jar, Redirect::to(&return_to)));
    };

    tracing::info!("Exchanging authorization code for tokens");

    let tokens = TokenManager::new(&state.strava, &state.db);
    let jar = match tokens.authorize(&code).await {
        Ok(account) => {
            tracing::info!(athlete_id = account.athlete_id, "OAuth successful");
            push_flash(jar, FlashLevel::Success, "Strava authorization successful!")
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth code exchange failed");
            push_flash(jar, FlashLevel::Danger, "Failed to authorize with Strava")
        }
    };

    Ok((jar, Redirect::to(&return_to)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const ISSUED: u128 = 1_700_000_000_000;

    #[test]
    fn test_verify_state_success() {
        let signed = sign_state("/", ISSUED, SECRET).unwrap();
        assert_eq!(
            verify_state(&signed, SECRET, ISSUED + 1_000),
            Some("/".to_string())
        );
    }

    #[test]
    fn test_verify_state_invalid_signature() {
        let payload = format!("/|{:x}|{}", ISSUED, "00".repeat(32));
        let forged = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        assert_eq!(verify_state(&forged, SECRET, ISSUED), None);
    }

    #[test]
    fn test_verify_state_wrong_secret() {
        let signed = sign_state("/", ISSUED, SECRET).unwrap();
        assert_eq!(verify_state(&signed, b"wrong_key", ISSUED), None);
    }

    #[test]
    fn test_verify_state_tampered_path() {
        let signed = sign_state("/", ISSUED, SECRET).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&signed).unwrap()).unwrap();
        let tampered = URL_SAFE_NO_PAD.encode(decoded.replacen('/', "/evil", 1));
        assert_eq!(verify_state(&tampered, SECRET, ISSUED), None);
    }

    #[test]
    fn test_verify_state_expired() {
        let signed = sign_state("/", ISSUED, SECRET).unwrap();
        assert!(verify_state(&signed, SECRET, ISSUED + STATE_MAX_AGE_MS).is_some());
        assert_eq!(
            verify_state(&signed, SECRET, ISSUED + STATE_MAX_AGE_MS + 1),
            None
        );
        assert_eq!(verify_state(&signed, SECRET, ISSUED - 1), None);
    }

    #[test]
    fn test_verify_state_malformed() {
        let encoded = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_state(&encoded, SECRET, ISSUED), None);
        assert_eq!(verify_state("***", SECRET, ISSUED), None);
    }

    #[test]
    fn test_local_path_check() {
        assert!(is_local_path("/"));
        assert!(is_local_path("/weather_graphs"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example"));
    }
}
