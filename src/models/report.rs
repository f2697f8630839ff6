// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregate rows produced by the report queries.

use serde::{Deserialize, Serialize};

/// Which weather label the reports group by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportGrouping {
    /// Coarse condition, e.g. "Clear"
    #[default]
    Condition,
    /// Fine description, e.g. "scattered clouds"
    Description,
}

impl ReportGrouping {
    /// SQL column expression for the grouping label.
    pub(crate) fn column(self) -> &'static str {
        match self {
            ReportGrouping::Condition => "wd.main",
            ReportGrouping::Description => "wd.description",
        }
    }

    /// Column header used in CSV output and chart axes.
    pub fn header(self) -> &'static str {
        match self {
            ReportGrouping::Condition => "Weather Condition",
            ReportGrouping::Description => "Weather Description",
        }
    }
}

/// One row of a grouped aggregate: the label, the metric value and the
/// number of activities behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionAggregate {
    pub label: String,
    pub value: f64,
    pub activity_count: i64,
}

/// Activity count for one (weather label, activity type) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedCount {
    pub label: String,
    pub activity_type: String,
    pub count: i64,
}

/// The three aggregates the report generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMetric {
    AverageDistance,
    AverageMovingTime,
    ActivityCount,
}

impl ReportMetric {
    pub const ALL: [ReportMetric; 3] = [
        ReportMetric::AverageDistance,
        ReportMetric::AverageMovingTime,
        ReportMetric::ActivityCount,
    ];

    /// SQL aggregate over the `activities AS a` alias.
    pub(crate) fn sql_expr(self) -> &'static str {
        match self {
            ReportMetric::AverageDistance => "AVG(a.distance)",
            ReportMetric::AverageMovingTime => "AVG(a.moving_time)",
            ReportMetric::ActivityCount => "CAST(COUNT(a.activity_id) AS REAL)",
        }
    }

    pub fn value_header(self) -> &'static str {
        match self {
            ReportMetric::AverageDistance => "Average Distance (m)",
            ReportMetric::AverageMovingTime => "Average Moving Time (sec)",
            ReportMetric::ActivityCount => "Activity Count",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportMetric::AverageDistance => "Average Activity Distance by Weather",
            ReportMetric::AverageMovingTime => "Average Moving Time by Weather",
            ReportMetric::ActivityCount => "Activity Count by Weather",
        }
    }

    pub fn csv_file_name(self) -> &'static str {
        match self {
            ReportMetric::AverageDistance => "average_distance_by_weather.csv",
            ReportMetric::AverageMovingTime => "average_moving_time_by_weather.csv",
            ReportMetric::ActivityCount => "activity_count_by_weather.csv",
        }
    }

    pub fn chart_file_name(self) -> &'static str {
        match self {
            ReportMetric::AverageDistance => "weather_graph_avg_distance.png",
            ReportMetric::AverageMovingTime => "weather_graph_avg_time.png",
            ReportMetric::ActivityCount => "weather_graph_activity_count.png",
        }
    }
}
