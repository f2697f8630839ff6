// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weather report page.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::ReportGrouping;
use crate::routes::pages::{escape_html, page};
use crate::services::{ReportArtifacts, ReportOutcome};
use crate::AppState;

pub const NO_DATA_MESSAGE: &str = "No data available for graphs.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/weather_graphs", get(weather_graphs))
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphParams {
    #[serde(default)]
    grouping: ReportGrouping,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn render_artifacts(grouping: ReportGrouping, artifacts: &ReportArtifacts) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<h1>Weather Analysis Graphs</h1>\n<p>Grouped by {}</p>",
        escape_html(grouping.header())
    );

    if artifacts.chart_paths.is_empty() {
        body.push_str("<p>Charts could not be rendered; CSV summaries are below.</p>\n");
    }
    for path in &artifacts.chart_paths {
        let name = escape_html(&file_name(path));
        let _ = writeln!(
            body,
            "<div><img src=\"/static/{name}\" alt=\"{name}\"></div>"
        );
    }

    body.push_str("<h2>CSV summaries</h2>\n<ul>\n");
    for path in &artifacts.csv_paths {
        let name = escape_html(&file_name(path));
        let _ = writeln!(body, "<li><a href=\"/static/{name}\">{name}</a></li>");
    }
    body.push_str("</ul>\n");
    body
}

/// Generate the reports and show the charts.
async fn weather_graphs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GraphParams>,
) -> Result<Html<String>> {
    let db = state.db.clone();
    let reports = state.reports.clone();
    let grouping = params.grouping;

    // Chart rendering is CPU-bound.
    let outcome = tokio::task::spawn_blocking(move || reports.generate(&db, grouping))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Report task failed: {}", e)))??;

    match outcome {
        ReportOutcome::NoData => Ok(Html(NO_DATA_MESSAGE.to_string())),
        ReportOutcome::Generated(artifacts) => Ok(page(
            "Weather Analysis Graphs",
            &render_artifacts(grouping, &artifacts),
        )),
    }
}
