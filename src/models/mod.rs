// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod account;
pub mod activity;
pub mod report;
pub mod weather;

pub use account::Account;
pub use activity::{Activity, LatLng};
pub use report::{ConditionAggregate, ReportGrouping, ReportMetric, StackedCount};
pub use weather::WeatherObservation;
