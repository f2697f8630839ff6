// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Historical weather lookup and activity enrichment.
//!
//! Uses OpenWeather's One Call "timemachine" endpoint. Both the 3.0 shape
//! (`data[]` with flat fields) and the older history shape (`list[]` with
//! nested `main`/`wind` blocks) are accepted.

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::weather::UNKNOWN_CONDITION;
use crate::models::{Activity, LatLng, WeatherObservation};
use serde::{Deserialize, Serialize};
use std::future::Future;

const WEATHER_ENDPOINT: &str = "weather timemachine";

/// Historical weather for a location and instant.
pub trait WeatherSource {
    fn timemachine(
        &self,
        location: LatLng,
        unix_time: i64,
    ) -> impl Future<Output = Result<TimemachineResponse, AppError>> + Send;
}

/// OpenWeather API client.
#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.openweather_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
        }
    }
}

impl WeatherSource for WeatherClient {
    async fn timemachine(
        &self,
        location: LatLng,
        unix_time: i64,
    ) -> Result<TimemachineResponse, AppError> {
        let response = self
            .http
            .get(format!("{}/timemachine", self.base_url))
            .query(&[
                ("lat", location.lat.to_string()),
                ("lon", location.lng.to_string()),
                ("dt", unix_time.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::WeatherApi(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                tracing::warn!("OpenWeather rate limit hit (429)");
                return Err(AppError::WeatherApi(AppError::RATE_LIMITED.to_string()));
            }
            return Err(AppError::WeatherApi(format!("HTTP {}: {}", status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::WeatherApi(format!("Failed to read body: {}", e)))?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::malformed(WEATHER_ENDPOINT, e.to_string()))
    }
}

/// Timemachine response; every field optional until validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimemachineResponse {
    pub timezone: Option<String>,
    pub timezone_offset: Option<i64>,
    #[serde(alias = "list")]
    pub data: Option<Vec<WeatherDataPoint>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherDataPoint {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub main: Option<MainBlock>,
    pub wind: Option<WindBlock>,
    pub weather: Option<Vec<ConditionBlock>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainBlock {
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindBlock {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionBlock {
    pub main: Option<String>,
    pub description: Option<String>,
}

impl TimemachineResponse {
    /// Validate the payload and turn its first data point into an observation.
    pub fn into_observation(self, activity_id: u64) -> Result<WeatherObservation, AppError> {
        let point = self
            .data
            .and_then(|points| points.into_iter().next())
            .ok_or_else(|| AppError::malformed(WEATHER_ENDPOINT, "no data points"))?;

        let nested = point.main.unwrap_or_default();
        let temperature = point.temp.or(nested.temp).ok_or_else(|| {
            AppError::malformed(WEATHER_ENDPOINT, "data point without temperature")
        })?;

        let condition = point
            .weather
            .and_then(|w| w.into_iter().next())
            .unwrap_or_default();

        Ok(WeatherObservation {
            activity_id,
            temperature,
            humidity: point.humidity.or(nested.humidity),
            wind_speed: point.wind_speed.or(point.wind.and_then(|w| w.speed)),
            condition: condition
                .main
                .unwrap_or_else(|| UNKNOWN_CONDITION.to_string()),
            description: condition
                .description
                .unwrap_or_else(|| UNKNOWN_CONDITION.to_string()),
            timezone: self.timezone,
            timezone_offset: self.timezone_offset,
        })
    }
}

/// Why an activity was not looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingCoordinates,
    ZeroCoordinates,
    UnparseableStartTime,
    AlreadyObserved,
}

/// Result of enriching one activity.
#[derive(Debug)]
pub enum EnrichOutcome {
    Observed(WeatherObservation),
    Skipped(SkipReason),
    Failed(AppError),
}

/// Totals for one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichSummary {
    pub observed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Activities left unvisited after the weather API rate-limited the pass
    pub deferred: usize,
}

/// Attaches historical weather to stored activities.
pub struct WeatherEnricher<'a, W> {
    source: &'a W,
    db: &'a Database,
}

impl<'a, W: WeatherSource + Sync> WeatherEnricher<'a, W> {
    pub fn new(source: &'a W, db: &'a Database) -> Self {
        Self { source, db }
    }

    /// Look up and store the weather at an activity's start.
    ///
    /// Nothing is recorded for skips or failures, so a later pass tries again.
    pub async fn enrich(&self, activity: &Activity) -> EnrichOutcome {
        let activity_id = activity.activity_id;

        let Some(location) = activity.weather_location() else {
            let reason = if activity.start_latlng.is_some() {
                SkipReason::ZeroCoordinates
            } else {
                SkipReason::MissingCoordinates
            };
            return self.skip(activity_id, reason);
        };
        let Some(unix_time) = activity.start_timestamp() else {
            return self.skip(activity_id, SkipReason::UnparseableStartTime);
        };

        tracing::debug!(
            activity_id,
            lat = location.lat,
            lon = location.lng,
            unix_time,
            "Fetching historical weather"
        );

        let result = match self.source.timemachine(location, unix_time).await {
            Ok(response) => response.into_observation(activity_id),
            Err(e) => Err(e),
        };
        let observation = match result {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Weather lookup failed");
                return EnrichOutcome::Failed(e);
            }
        };

        match self.db.insert_weather(&observation) {
            Ok(true) => {
                tracing::info!(
                    activity_id,
                    condition = %observation.condition,
                    "Weather stored"
                );
                EnrichOutcome::Observed(observation)
            }
            Ok(false) => self.skip(activity_id, SkipReason::AlreadyObserved),
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Failed to store weather");
                EnrichOutcome::Failed(e)
            }
        }
    }

    /// Enrich every activity that has no observation yet.
    ///
    /// Stops at the first rate-limited lookup; the rest stay pending.
    pub async fn enrich_pending(&self) -> Result<EnrichSummary, AppError> {
        let pending = self.db.activities_without_weather()?;
        let mut summary = EnrichSummary::default();

        for (i, activity) in pending.iter().enumerate() {
            match self.enrich(activity).await {
                EnrichOutcome::Observed(_) => summary.observed += 1,
                EnrichOutcome::Skipped(_) => summary.skipped += 1,
                EnrichOutcome::Failed(e) => {
                    summary.failed += 1;
                    if e.is_rate_limited() {
                        summary.deferred = pending.len() - i - 1;
                        tracing::warn!(
                            deferred = summary.deferred,
                            "Weather API rate limit reached, stopping pass"
                        );
                        break;
                    }
                }
            }
        }

        tracing::info!(
            pending = pending.len(),
            observed = summary.observed,
            skipped = summary.skipped,
            failed = summary.failed,
            deferred = summary.deferred,
            "Weather enrichment finished"
        );
        Ok(summary)
    }

    fn skip(&self, activity_id: u64, reason: SkipReason) -> EnrichOutcome {
        tracing::info!(activity_id, reason = ?reason, "Skipping weather lookup");
        EnrichOutcome::Skipped(reason)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::tests::{sample_activity, test_db};
    use crate::db::tables;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed JSON document for every lookup; `None` fails the call.
    pub(crate) struct FakeWeatherSource {
        pub body: Option<serde_json::Value>,
        pub rate_limited: bool,
        pub calls: AtomicUsize,
    }

    impl FakeWeatherSource {
        pub(crate) fn new(body: Option<serde_json::Value>) -> Self {
            Self {
                body,
                rate_limited: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn rate_limited() -> Self {
            Self {
                rate_limited: true,
                ..Self::new(None)
            }
        }
    }

    impl WeatherSource for FakeWeatherSource {
        async fn timemachine(
            &self,
            _location: LatLng,
            _unix_time: i64,
        ) -> Result<TimemachineResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limited {
                return Err(AppError::WeatherApi(AppError::RATE_LIMITED.to_string()));
            }
            match &self.body {
                Some(body) => serde_json::from_value(body.clone())
                    .map_err(|e| AppError::malformed(WEATHER_ENDPOINT, e.to_string())),
                None => Err(AppError::WeatherApi("HTTP 503".to_string())),
            }
        }
    }

    pub(crate) fn onecall_body(main: &str, description: &str) -> serde_json::Value {
        serde_json::json!({
            "lat": 42.28,
            "lon": -83.74,
            "timezone": "America/Detroit",
            "timezone_offset": -14400,
            "data": [{
                "dt": 1714548600,
                "temp": 11.2,
                "humidity": 71,
                "wind_speed": 4.6,
                "weather": [{ "id": 800, "main": main, "description": description, "icon": "01d" }]
            }]
        })
    }

    #[test]
    fn test_onecall_payload_converts() {
        let response: TimemachineResponse =
            serde_json::from_value(onecall_body("Clear", "clear sky")).unwrap();
        let obs = response.into_observation(5).unwrap();
        assert_eq!(obs.temperature, 11.2);
        assert_eq!(obs.humidity, Some(71.0));
        assert_eq!(obs.wind_speed, Some(4.6));
        assert_eq!(obs.condition, "Clear");
        assert_eq!(obs.description, "clear sky");
        assert_eq!(obs.timezone.as_deref(), Some("America/Detroit"));
    }

    #[test]
    fn test_history_list_payload_converts() {
        let response: TimemachineResponse = serde_json::from_value(serde_json::json!({
            "list": [{
                "main": { "temp": 3.5, "humidity": 90 },
                "wind": { "speed": 7.0 },
                "weather": [{ "main": "Snow", "description": "light snow" }]
            }]
        }))
        .unwrap();
        let obs = response.into_observation(5).unwrap();
        assert_eq!(obs.temperature, 3.5);
        assert_eq!(obs.humidity, Some(90.0));
        assert_eq!(obs.wind_speed, Some(7.0));
        assert_eq!(obs.condition, "Snow");
    }

    #[test]
    fn test_missing_condition_defaults_to_unknown() {
        let response: TimemachineResponse =
            serde_json::from_value(serde_json::json!({ "data": [{ "temp": 20.0 }] })).unwrap();
        let obs = response.into_observation(5).unwrap();
        assert_eq!(obs.condition, UNKNOWN_CONDITION);
        assert_eq!(obs.description, UNKNOWN_CONDITION);
        assert_eq!(obs.humidity, None);
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        for body in [
            serde_json::json!({}),
            serde_json::json!({ "data": [] }),
            serde_json::json!({ "data": [{ "humidity": 50 }] }),
        ] {
            let response: TimemachineResponse = serde_json::from_value(body).unwrap();
            assert!(matches!(
                response.into_observation(1),
                Err(AppError::MalformedPayload { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_enrich_stores_observation() {
        let (_dir, db) = test_db();
        let activity = sample_activity(1, "Run", 5000.0);
        db.insert_activities(std::slice::from_ref(&activity)).unwrap();
        let source = FakeWeatherSource::new(Some(onecall_body("Rain", "light rain")));

        let enricher = WeatherEnricher::new(&source, &db);
        let outcome = enricher.enrich(&activity).await;

        assert!(matches!(outcome, EnrichOutcome::Observed(ref o) if o.condition == "Rain"));
        assert_eq!(db.get_weather(1).unwrap().unwrap().description, "light rain");

        assert!(matches!(
            enricher.enrich(&activity).await,
            EnrichOutcome::Skipped(SkipReason::AlreadyObserved)
        ));
        assert_eq!(db.count(tables::WEATHER).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_never_get_weather() {
        let (_dir, db) = test_db();
        let mut missing = sample_activity(1, "Run", 5000.0);
        missing.start_latlng = None;
        let mut zero = sample_activity(2, "Run", 5000.0);
        zero.start_latlng = Some(LatLng { lat: 0.0, lng: 0.0 });
        db.insert_activities(&[missing, zero]).unwrap();
        let source = FakeWeatherSource::new(Some(onecall_body("Clear", "clear sky")));

        let summary = WeatherEnricher::new(&source, &db)
            .enrich_pending()
            .await
            .unwrap();

        assert_eq!(
            summary,
            EnrichSummary {
                observed: 0,
                skipped: 2,
                failed: 0,
                deferred: 0,
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(db.count(tables::WEATHER).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_retried_on_next_pass() {
        let (_dir, db) = test_db();
        db.insert_activities(&[sample_activity(1, "Run", 5000.0)])
            .unwrap();

        let failing = FakeWeatherSource::new(None);
        let summary = WeatherEnricher::new(&failing, &db)
            .enrich_pending()
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(db.activities_without_weather().unwrap().len(), 1);

        let working = FakeWeatherSource::new(Some(onecall_body("Clouds", "overcast clouds")));
        let summary = WeatherEnricher::new(&working, &db)
            .enrich_pending()
            .await
            .unwrap();
        assert_eq!(summary.observed, 1);
        assert!(db.activities_without_weather().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_stops_the_pass() {
        let (_dir, db) = test_db();
        db.insert_activities(&[
            sample_activity(1, "Run", 1000.0),
            sample_activity(2, "Run", 2000.0),
            sample_activity(3, "Ride", 3000.0),
        ])
        .unwrap();

        let source = FakeWeatherSource::rate_limited();
        let summary = WeatherEnricher::new(&source, &db)
            .enrich_pending()
            .await
            .unwrap();

        assert_eq!(
            summary,
            EnrichSummary {
                observed: 0,
                skipped: 0,
                failed: 1,
                deferred: 2,
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.activities_without_weather().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_other_failures_do_not_stop_the_pass() {
        let (_dir, db) = test_db();
        db.insert_activities(&[
            sample_activity(1, "Run", 1000.0),
            sample_activity(2, "Run", 2000.0),
        ])
        .unwrap();

        let source = FakeWeatherSource::new(None);
        let summary = WeatherEnricher::new(&source, &db)
            .enrich_pending()
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.deferred, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
