// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weather/activity correlation reports.
//!
//! Each report is an aggregate grouped by weather label, written to a CSV
//! file and rendered to a PNG chart in the reports directory.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{ConditionAggregate, ReportGrouping, ReportMetric, StackedCount};
use crate::services::charts;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Files produced by one report run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportArtifacts {
    pub csv_paths: Vec<PathBuf>,
    pub chart_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// No activity has weather yet; nothing was written.
    NoData,
    Generated(ReportArtifacts),
}

/// Aggregates gathered for one run.
struct ReportData {
    aggregates: Vec<(ReportMetric, Vec<ConditionAggregate>)>,
    by_type: Vec<StackedCount>,
}

#[derive(Debug, Clone)]
pub struct ReportGenerator {
    reports_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Write all CSV files and render all charts.
    ///
    /// CSV failures abort the run. A chart that fails to render is logged and
    /// left out of `chart_paths`.
    pub fn generate(
        &self,
        db: &Database,
        grouping: ReportGrouping,
    ) -> Result<ReportOutcome, AppError> {
        let Some(data) = self.collect(db, grouping)? else {
            return Ok(ReportOutcome::NoData);
        };

        let mut artifacts = ReportArtifacts {
            csv_paths: self.write_csvs(&data, grouping)?,
            chart_paths: Vec::new(),
        };

        for (metric, rows) in &data.aggregates {
            let path = self.reports_dir.join(metric.chart_file_name());
            let rendered = match metric {
                ReportMetric::AverageDistance => {
                    charts::render_bar_chart(&path, *metric, grouping, rows)
                }
                ReportMetric::AverageMovingTime => {
                    charts::render_scatter_chart(&path, *metric, grouping, rows)
                }
                ReportMetric::ActivityCount => {
                    charts::render_stacked_area_chart(&path, grouping, &data.by_type)
                }
            };
            match rendered {
                Ok(()) => artifacts.chart_paths.push(path),
                Err(e) => tracing::warn!(chart = %path.display(), error = %e, "Chart omitted"),
            }
        }

        tracing::info!(
            grouping = ?grouping,
            csv_files = artifacts.csv_paths.len(),
            charts = artifacts.chart_paths.len(),
            "Reports generated"
        );
        Ok(ReportOutcome::Generated(artifacts))
    }

    /// Write only the CSV summaries.
    pub fn export_csv(
        &self,
        db: &Database,
        grouping: ReportGrouping,
    ) -> Result<ReportOutcome, AppError> {
        let Some(data) = self.collect(db, grouping)? else {
            return Ok(ReportOutcome::NoData);
        };
        let csv_paths = self.write_csvs(&data, grouping)?;
        tracing::info!(csv_files = csv_paths.len(), "CSV summaries exported");
        Ok(ReportOutcome::Generated(ReportArtifacts {
            csv_paths,
            chart_paths: Vec::new(),
        }))
    }

    fn collect(
        &self,
        db: &Database,
        grouping: ReportGrouping,
    ) -> Result<Option<ReportData>, AppError> {
        let mut aggregates = Vec::with_capacity(ReportMetric::ALL.len());
        for metric in ReportMetric::ALL {
            let rows = db.aggregate_by_weather(metric, grouping)?;
            // Every metric runs over the same join.
            if rows.is_empty() {
                tracing::info!("No activities with weather, skipping reports");
                return Ok(None);
            }
            aggregates.push((metric, rows));
        }
        let by_type = db.count_by_weather_and_type(grouping)?;
        Ok(Some(ReportData {
            aggregates,
            by_type,
        }))
    }

    fn write_csvs(
        &self,
        data: &ReportData,
        grouping: ReportGrouping,
    ) -> Result<Vec<PathBuf>, AppError> {
        std::fs::create_dir_all(&self.reports_dir)?;
        data.aggregates
            .iter()
            .map(|(metric, rows)| -> Result<PathBuf, AppError> {
                let path = self.reports_dir.join(metric.csv_file_name());
                write_csv(&path, *metric, grouping, rows)?;
                Ok(path)
            })
            .collect()
    }
}

fn write_csv(
    path: &Path,
    metric: ReportMetric,
    grouping: ReportGrouping,
    rows: &[ConditionAggregate],
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)?;

    if metric == ReportMetric::ActivityCount {
        writer.write_record([grouping.header(), metric.value_header()])?;
        for row in rows {
            writer.write_record([row.label.clone(), row.activity_count.to_string()])?;
        }
    } else {
        writer.write_record([grouping.header(), metric.value_header(), "Activity Count"])?;
        for row in rows {
            writer.write_record([
                row.label.clone(),
                format!("{:.2}", row.value),
                row.activity_count.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}
