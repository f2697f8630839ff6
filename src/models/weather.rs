// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weather observation model for storage.

use serde::{Deserialize, Serialize};

/// Label stored when the provider omitted the condition block.
pub const UNKNOWN_CONDITION: &str = "Unknown";

/// Historical weather at an activity's start, one per activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Strava activity ID this observation belongs to
    pub activity_id: u64,
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: Option<f64>,
    /// Wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Coarse condition label ("Clear", "Rain", ...)
    pub condition: String,
    /// Fine description ("light rain", ...)
    pub description: String,
    /// IANA timezone name of the location
    pub timezone: Option<String>,
    /// Offset from UTC in seconds
    pub timezone_offset: Option<i64>,
}
