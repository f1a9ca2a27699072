use std::f64::consts::{FRAC_PI_2, TAU};
use std::ops::Range;

use anyhow::{Result, anyhow};
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontFamily, FontStyle};

use super::fonts::FAMILY;
use super::{ChartData, ChartSpec, LineAxis};
use crate::color::{diverging, generate_palette};
use crate::data::stats::CorrelationMatrix;

/// Single-series colour.
const ACCENT: RGBColor = RGBColor(31, 119, 180);

type Plane<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("drawing chart: {err}")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Draw `spec` onto `root`. With `text == false` only shapes are drawn
/// (no title, axis labels or annotations).
pub fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    text: bool,
) -> Result<()> {
    root.fill(&WHITE).map_err(draw_err)?;
    let area = if text {
        root.titled(&spec.title, font(26.0)).map_err(draw_err)?
    } else {
        root.clone()
    };

    match &spec.data {
        ChartData::Bars { labels, values } => bars(&area, spec, labels, values, text)?,
        ChartData::Line { points, axis } => line(&area, spec, points, axis, text)?,
        ChartData::Points(points) => scatter(&area, spec, points, text)?,
        ChartData::Slices { labels, values } => pie(&area, labels, values, text)?,
        ChartData::Bins { edges, counts } => bins(&area, spec, edges, counts, text)?,
        ChartData::Matrix(matrix) => heatmap(&area, matrix, text)?,
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cartesian charts
// ---------------------------------------------------------------------------

fn cartesian<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    x: Range<f64>,
    y: Range<f64>,
    text: bool,
) -> Result<Plane<'a, DB>> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if text {
        builder.x_label_area_size(50).y_label_area_size(70);
    }
    builder.build_cartesian_2d(x, y).map_err(draw_err)
}

fn mesh<DB: DrawingBackend>(
    chart: &mut Plane<'_, DB>,
    spec: &ChartSpec,
    x_fmt: Option<&dyn Fn(&f64) -> String>,
    x_labels: Option<usize>,
) -> Result<()> {
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .label_style(font(14.0))
        .axis_desc_style(font(16.0));
    if let Some(fmt) = x_fmt {
        mesh.x_label_formatter(fmt);
    }
    if let Some(n) = x_labels {
        mesh.x_labels(n);
    }
    mesh.draw().map_err(draw_err)
}

fn bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    labels: &[String],
    values: &[f64],
    text: bool,
) -> Result<()> {
    let n = labels.len().max(1) as f64;
    let (lo, hi) = span(values.iter().copied().chain([0.0]));
    let mut chart = cartesian(area, -0.5..n - 0.5, padded(lo, hi), text)?;
    if text {
        let fmt = category_formatter(labels);
        mesh(&mut chart, spec, Some(&fmt), Some(labels.len()))?;
    }

    let palette = generate_palette(labels.len());
    chart
        .draw_series(
            values
                .iter()
                .zip(&palette)
                .enumerate()
                .filter(|(_, (v, _))| v.is_finite())
                .map(|(i, (v, color))| {
                    let x = i as f64;
                    Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *v)], color.filled())
                }),
        )
        .map_err(draw_err)?;
    Ok(())
}

fn line<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &[(f64, f64)],
    axis: &LineAxis,
    text: bool,
) -> Result<()> {
    let points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let (x_lo, x_hi) = span(points.iter().map(|p| p.0));
    let (y_lo, y_hi) = span(points.iter().map(|p| p.1));
    let mut chart = cartesian(area, padded(x_lo, x_hi), padded(y_lo, y_hi), text)?;

    if text {
        match axis {
            LineAxis::Dates { origin } => {
                let fmt = date_formatter(*origin);
                mesh(&mut chart, spec, Some(&fmt), None)?;
            }
            LineAxis::Ordinal { labels } => {
                let fmt = category_formatter(labels);
                mesh(&mut chart, spec, Some(&fmt), Some(labels.len()))?;
            }
        }
    }

    chart
        .draw_series(LineSeries::new(points.iter().copied(), ACCENT.stroke_width(2)))
        .map_err(draw_err)?;
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, ACCENT.filled())))
        .map_err(draw_err)?;
    Ok(())
}

fn scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    points: &[(f64, f64)],
    text: bool,
) -> Result<()> {
    let finite = || {
        points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
    };
    let (x_lo, x_hi) = span(finite().map(|p| p.0));
    let (y_lo, y_hi) = span(finite().map(|p| p.1));
    let mut chart = cartesian(area, padded(x_lo, x_hi), padded(y_lo, y_hi), text)?;
    if text {
        mesh(&mut chart, spec, None, None)?;
    }
    chart
        .draw_series(finite().map(|p| Circle::new(p, 4, ACCENT.mix(0.7).filled())))
        .map_err(draw_err)?;
    Ok(())
}

fn bins<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    edges: &[f64],
    counts: &[usize],
    text: bool,
) -> Result<()> {
    let (Some(&first), Some(&last)) = (edges.first(), edges.last()) else {
        return Ok(());
    };
    let top = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.05;
    let mut chart = cartesian(area, first..last, 0.0..top, text)?;
    if text {
        mesh(&mut chart, spec, None, None)?;
    }
    chart
        .draw_series(edges.windows(2).zip(counts).map(|(edge, &count)| {
            Rectangle::new([(edge[0], 0.0), (edge[1], count as f64)], ACCENT.mix(0.85).filled())
        }))
        .map_err(draw_err)?;
    chart
        .draw_series(edges.windows(2).zip(counts).map(|(edge, &count)| {
            Rectangle::new([(edge[0], 0.0), (edge[1], count as f64)], WHITE.stroke_width(1))
        }))
        .map_err(draw_err)?;
    Ok(())
}

fn heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    matrix: &CorrelationMatrix,
    text: bool,
) -> Result<()> {
    let n = matrix.names.len();
    let extent = -0.5..n as f64 - 0.5;
    let mut chart = cartesian(area, extent.clone(), extent, text)?;

    // Row 0 is drawn at the top.
    let row_y = |i: usize| (n - 1 - i) as f64;

    if text {
        let x_fmt = category_formatter(&matrix.names);
        let reversed: Vec<String> = matrix.names.iter().rev().cloned().collect();
        let y_fmt = category_formatter(&reversed);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n)
            .y_labels(n)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .label_style(font(13.0))
            .draw()
            .map_err(draw_err)?;
    }

    let cells = || {
        matrix.values.iter().enumerate().flat_map(move |(i, row)| {
            row.iter()
                .enumerate()
                .map(move |(j, v)| (j as f64, row_y(i), *v))
        })
    };
    chart
        .draw_series(cells().map(|(x, y, v)| {
            Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], diverging(v).filled())
        }))
        .map_err(draw_err)?;

    if text {
        chart
            .draw_series(cells().map(|(x, y, v)| Text::new(format!("{v:.2}"), (x, y), centered(13.0))))
            .map_err(draw_err)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pie chart (drawn in pixel space)
// ---------------------------------------------------------------------------

fn pie<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    labels: &[String],
    values: &[f64],
    text: bool,
) -> Result<()> {
    let positive = |v: &f64| v.is_finite() && *v > 0.0;
    let total: f64 = values.iter().copied().filter(positive).sum();
    if total <= 0.0 {
        return Ok(());
    }

    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = w.min(h) as f64 * 0.35;
    let palette = generate_palette(labels.len());

    let mut start = -FRAC_PI_2;
    for ((label, value), color) in labels.iter().zip(values).zip(&palette) {
        if !positive(value) {
            continue;
        }
        let sweep = value / total * TAU;
        let steps = (sweep.to_degrees().ceil() as usize).max(2);
        let mut outline = vec![center];
        outline.extend((0..=steps).map(|s| {
            polar(center, radius, start + sweep * s as f64 / steps as f64)
        }));
        area.draw(&Polygon::new(outline, color.filled()))
            .map_err(draw_err)?;

        if text {
            let anchor = polar(center, radius * 1.18, start + sweep / 2.0);
            let share = value / total * 100.0;
            area.draw(&Text::new(format!("{label} ({share:.1}%)"), anchor, centered(14.0)))
                .map_err(draw_err)?;
        }
        start += sweep;
    }
    Ok(())
}

fn polar(center: (i32, i32), radius: f64, angle: f64) -> (i32, i32) {
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}

// -- helpers --

fn font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::Name(FAMILY), size, FontStyle::Normal)
}

fn centered(size: f64) -> TextStyle<'static> {
    TextStyle::from(font(size)).pos(Pos::new(HPos::Center, VPos::Center))
}

/// Label integer positions with `labels[i]`, everything else blank.
fn category_formatter(labels: &[String]) -> impl Fn(&f64) -> String + '_ {
    move |x| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    }
}

fn date_formatter(origin: NaiveDate) -> impl Fn(&f64) -> String {
    move |x| {
        origin
            .checked_add_signed(Duration::days(x.round() as i64))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Axis range around `[lo, hi]` with 5% headroom.
fn padded(lo: f64, hi: f64) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if lo == hi {
        return lo - 1.0..hi + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    lo - pad..hi + pad
}
