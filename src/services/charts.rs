// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PNG chart rendering for the weather reports.

use crate::error::AppError;
use crate::models::{ConditionAggregate, ReportGrouping, ReportMetric, StackedCount};
use plotters::prelude::*;
use std::collections::BTreeSet;
use std::error::Error;
use std::ops::Range;
use std::path::Path;

const CHART_SIZE: (u32, u32) = (1024, 768);

/// Bar chart of one aggregate per weather label.
pub fn render_bar_chart(
    path: &Path,
    metric: ReportMetric,
    grouping: ReportGrouping,
    rows: &[ConditionAggregate],
) -> Result<(), AppError> {
    draw_bars(path, metric, grouping, rows).map_err(|e| chart_err(path, e))
}

/// Scatter chart of one aggregate per weather label.
pub fn render_scatter_chart(
    path: &Path,
    metric: ReportMetric,
    grouping: ReportGrouping,
    rows: &[ConditionAggregate],
) -> Result<(), AppError> {
    draw_scatter(path, metric, grouping, rows).map_err(|e| chart_err(path, e))
}

/// Stacked-area chart of activity counts per weather label, one layer per
/// activity type. Labels are ordered by total count, highest first.
pub fn render_stacked_area_chart(
    path: &Path,
    grouping: ReportGrouping,
    cells: &[StackedCount],
) -> Result<(), AppError> {
    draw_stacked_area(path, grouping, cells).map_err(|e| chart_err(path, e))
}

fn chart_err(path: &Path, e: Box<dyn Error>) -> AppError {
    AppError::Report(format!("Failed to render {}: {}", path.display(), e))
}

/// Upper bound for a value axis, with headroom above the largest value.
fn value_axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn segment_label(labels: &[String], value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            labels.get(*i as usize).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

/// X range of the stacked-area chart. A single label gets a unit-wide band
/// centered on it so its area is visible.
fn stacked_x_range(label_count: usize) -> Range<f64> {
    if label_count <= 1 {
        -0.5..0.5
    } else {
        0.0..(label_count - 1) as f64
    }
}

/// Points of one cumulative layer, one per label (two for a lone label).
fn layer_points(layer: &[f64]) -> Vec<(f64, f64)> {
    match layer {
        [only] => vec![(-0.5, *only), (0.5, *only)],
        _ => layer
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect(),
    }
}

fn draw_bars(
    path: &Path,
    metric: ReportMetric,
    grouping: ReportGrouping,
    rows: &[ConditionAggregate],
) -> Result<(), Box<dyn Error>> {
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let y_max = value_axis_max(rows.iter().map(|r| r.value));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(metric.title(), ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d((0u32..labels.len() as u32).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(grouping.header())
        .y_desc(metric.value_header())
        .x_labels(labels.len())
        .x_label_formatter(&|v: &SegmentValue<u32>| segment_label(&labels, v))
        .light_line_style(BLACK.mix(0.15))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(12)
            .data(rows.iter().enumerate().map(|(i, r)| (i as u32, r.value))),
    )?;

    root.present()?;
    Ok(())
}

fn draw_scatter(
    path: &Path,
    metric: ReportMetric,
    grouping: ReportGrouping,
    rows: &[ConditionAggregate],
) -> Result<(), Box<dyn Error>> {
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let y_max = value_axis_max(rows.iter().map(|r| r.value));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(metric.title(), ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d((0u32..labels.len() as u32).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc(grouping.header())
        .y_desc(metric.value_header())
        .x_labels(labels.len())
        .x_label_formatter(&|v: &SegmentValue<u32>| segment_label(&labels, v))
        .light_line_style(BLACK.mix(0.15))
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, r)| {
        Circle::new(
            (SegmentValue::CenterOf(i as u32), r.value),
            7,
            RED.mix(0.8).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn draw_stacked_area(
    path: &Path,
    grouping: ReportGrouping,
    cells: &[StackedCount],
) -> Result<(), Box<dyn Error>> {
    let types: Vec<&str> = cells
        .iter()
        .map(|c| c.activity_type.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Labels by descending total, ties alphabetical.
    let mut totals: Vec<(String, i64)> = Vec::new();
    for cell in cells {
        match totals.iter_mut().find(|(label, _)| *label == cell.label) {
            Some((_, total)) => *total += cell.count,
            None => totals.push((cell.label.clone(), cell.count)),
        }
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let labels: Vec<String> = totals.iter().map(|(label, _)| label.clone()).collect();

    // layers[k][i] = counts of types 0..=k at label i
    let mut layers = vec![vec![0.0_f64; labels.len()]; types.len()];
    for cell in cells {
        let (Some(i), Some(k)) = (
            labels.iter().position(|l| *l == cell.label),
            types.iter().position(|t| *t == cell.activity_type),
        ) else {
            continue;
        };
        for layer in layers.iter_mut().skip(k) {
            layer[i] += cell.count as f64;
        }
    }

    let x_range = stacked_x_range(labels.len());
    let y_max = value_axis_max(totals.iter().map(|(_, total)| *total as f64));

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(ReportMetric::ActivityCount.title(), ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc(grouping.header())
        .y_desc(ReportMetric::ActivityCount.value_header())
        .x_labels(labels.len().max(3))
        .x_label_formatter(&|x: &f64| {
            let i = x.round();
            if (x - i).abs() < 1e-6 && i >= 0.0 {
                labels.get(i as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .light_line_style(BLACK.mix(0.15))
        .draw()?;

    // Topmost cumulative layer first so lower layers paint over it.
    for (k, layer) in layers.iter().enumerate().rev() {
        let color = Palette99::pick(k).to_rgba();
        chart
            .draw_series(AreaSeries::new(layer_points(layer), 0.0, color.mix(0.6)))?
            .label(types[k])
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
