// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity model for storage.

use serde::{Deserialize, Serialize};

/// A start coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// (0,0) is what devices report when they had no fix.
    pub fn is_null_island(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (globally unique)
    pub activity_id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Activity name/title
    pub name: String,
    /// Start date/time in the athlete's local time, as reported by Strava
    pub start_date_local: String,
    /// Start date/time in UTC, when Strava provided it
    pub start_date: Option<String>,
    /// Distance in meters
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_secs: i64,
    /// Coarse activity type (Ride, Run, Hike, etc.)
    pub activity_type: String,
    pub start_latlng: Option<LatLng>,
}

impl Activity {
    /// Coordinates usable for a weather lookup; `None` when missing or (0,0).
    pub fn weather_location(&self) -> Option<LatLng> {
        self.start_latlng.filter(|ll| !ll.is_null_island())
    }

    /// The timestamp weather is looked up for: the local start time read as UTC.
    pub fn start_timestamp(&self) -> Option<i64> {
        crate::time_utils::parse_unix_seconds(&self.start_date_local)
    }
}
