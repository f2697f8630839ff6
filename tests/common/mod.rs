// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared harness: an app backed by temp storage, and a local server that
//! stands in for the Strava and OpenWeather APIs.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::Response,
    routing,
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use strava_weather::config::Config;
use strava_weather::routes::create_router;
use strava_weather::AppState;
use tokio::net::TcpListener;
use tower::ServiceExt;

#[allow(dead_code)]
pub const GOOD_CODE: &str = "good-code";
#[allow(dead_code)]
pub const FAKE_ATHLETE_ID: u64 = 4242;

#[allow(dead_code)]
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[allow(dead_code)]
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

/// What the fake provider has seen and will serve.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FakeProvider {
    /// Activity listing served for page 1; later pages are empty.
    pub first_page: Arc<Mutex<Vec<Value>>>,
    pub token_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub activity_requests: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
    pub weather_requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    /// Answer every weather lookup with 429.
    pub weather_rate_limited: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
pub fn activity_json(id: u64, latlng: Value, distance: f64, kind: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Morning {}", kind),
        "start_date": "2024-05-01T11:30:00Z",
        "start_date_local": "2024-05-01T07:30:00Z",
        "distance": distance,
        "moving_time": (distance / 3.0) as i64,
        "type": kind,
        "sport_type": kind,
        "start_latlng": latlng
    })
}

async fn token_handler(
    State(fake): State<FakeProvider>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    fake.token_requests.lock().unwrap().push(form.clone());
    let expires_at = now_secs() + 21_600;

    let revoked = form.get("refresh_token").map(String::as_str) == Some("revoked");

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(GOOD_CODE) => (
            StatusCode::OK,
            Json(json!({
                "token_type": "Bearer",
                "access_token": "access-from-code",
                "refresh_token": "refresh-from-code",
                "expires_at": expires_at,
                "athlete": { "id": FAKE_ATHLETE_ID, "firstname": "Test" }
            })),
        ),
        Some("refresh_token") if !revoked => (
            StatusCode::OK,
            Json(json!({
                "token_type": "Bearer",
                "access_token": "access-from-refresh",
                "refresh_token": "refresh-from-refresh",
                "expires_at": expires_at
            })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Bad Request", "errors": [{ "code": "invalid" }] })),
        ),
    }
}

async fn activities_handler(
    State(fake): State<FakeProvider>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    fake.activity_requests
        .lock()
        .unwrap()
        .push((auth.clone(), params.clone()));

    if !auth.starts_with("Bearer access-") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Authorization Error" })),
        );
    }

    let page = params.get("page").and_then(|p| p.parse::<u32>().ok());
    match page {
        Some(1) => {
            let items = fake.first_page.lock().unwrap().clone();
            (StatusCode::OK, Json(Value::Array(items)))
        }
        _ => (StatusCode::OK, Json(json!([]))),
    }
}

async fn timemachine_handler(
    State(fake): State<FakeProvider>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    fake.weather_requests.lock().unwrap().push(params);

    if *fake.weather_rate_limited.lock().unwrap() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "cod": 429, "message": "Too many requests" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "lat": 42.28,
            "lon": -83.74,
            "timezone": "America/Detroit",
            "timezone_offset": -14400,
            "data": [{
                "dt": 1714548600,
                "temp": 11.2,
                "humidity": 71,
                "wind_speed": 4.6,
                "weather": [{
                    "id": 800,
                    "main": "Clear",
                    "description": "clear sky",
                    "icon": "01d"
                }]
            }]
        })),
    )
}

/// Start the fake provider on an ephemeral port; returns its base URL.
#[allow(dead_code)]
pub async fn spawn_fake_provider(fake: FakeProvider) -> String {
    let app = Router::new()
        .route("/oauth/token", routing::post(token_handler))
        .route("/api/v3/athlete/activities", routing::get(activities_handler))
        .route("/data/3.0/onecall/timemachine", routing::get(timemachine_handler))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    format!("http://{}", addr)
}

/// Test app whose clients point at `provider_url` and whose files live in a
/// temp directory. Keep the returned `TempDir` alive for the test's duration.
#[allow(dead_code)]
pub fn create_test_app(provider_url: &str) -> (Router, Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut config = Config::test_default();
    config.database_path = dir.path().join("activities.db");
    config.reports_dir = dir.path().join("static");
    config.activity_page_size = 25;
    config.strava_oauth_url = format!("{}/oauth", provider_url);
    config.strava_api_url = format!("{}/api/v3", provider_url);
    config.openweather_url = format!("{}/data/3.0/onecall", provider_url);

    let state = Arc::new(AppState::new(config).expect("app state"));
    (create_router(state.clone()), state, dir)
}

/// Test app for routes that never reach a provider.
#[allow(dead_code)]
pub fn create_offline_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
    create_test_app("http://127.0.0.1:9")
}

/// Issue a GET with an optional `Cookie` header.
#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut req = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Turn `Set-Cookie` headers into a `Cookie` header value for the next request.
#[allow(dead_code)]
pub fn cookie_header(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| s.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Follow a stage redirect to the landing page and return its HTML.
#[allow(dead_code)]
pub async fn landing_after(app: &Router, response: &Response) -> String {
    assert!(response.status().is_redirection(), "{}", response.status());
    let cookie = cookie_header(response);
    let landing = get(app, "/", Some(&cookie)).await;
    assert_eq!(landing.status(), StatusCode::OK);
    body_string(landing).await
}
