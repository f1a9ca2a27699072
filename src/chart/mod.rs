//! Chart layer: turns a dataset into a chart handle that can be exported.
//!
//! ```text
//!   Dataset ──► render(kind) ──► ChartHandle { ChartSpec }
//!                                    │
//!                                    ▼ export(path)
//!                       .svg → SVGBackend, else → bitmap + image encoder
//! ```
//!
//! The handle owns the data it plots, so it stays valid after the dataset
//! it came from is mutated or replaced.
mod draw;
mod fonts;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use plotters::prelude::*;
use thiserror::Error;

use crate::config::Config;
use crate::data::group::Aggregation;
use crate::data::model::{CellValue, Dataset};
use crate::data::stats::CorrelationMatrix;

// ---------------------------------------------------------------------------
// Chart kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
    Histogram,
    Heatmap,
}

impl ChartKind {
    /// Menu order.
    pub const ALL: [ChartKind; 6] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Pie,
        ChartKind::Histogram,
        ChartKind::Heatmap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar Plot",
            ChartKind::Line => "Line Plot",
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Histogram => "Histogram",
            ChartKind::Heatmap => "Heatmap",
        }
    }

    /// Columns that must exist by name before this chart can be drawn.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            ChartKind::Bar | ChartKind::Pie => &["Region", "Sales"],
            ChartKind::Line => &["Date", "Sales"],
            ChartKind::Scatter => &["Sales", "Profit"],
            ChartKind::Histogram => &["Sales"],
            ChartKind::Heatmap => &[],
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("missing column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("no numeric columns to correlate")]
    NoNumericColumns,
}

// ---------------------------------------------------------------------------
// Chart specification
// ---------------------------------------------------------------------------

/// Horizontal positions of a line chart.
#[derive(Debug, Clone, PartialEq)]
pub enum LineAxis {
    /// `x` is days since `origin`.
    Dates { origin: NaiveDate },
    /// `x` is the index into `labels`.
    Ordinal { labels: Vec<String> },
}

/// The data slices a chart plots.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Bars { labels: Vec<String>, values: Vec<f64> },
    Line { points: Vec<(f64, f64)>, axis: LineAxis },
    Points(Vec<(f64, f64)>),
    Slices { labels: Vec<String>, values: Vec<f64> },
    Bins { edges: Vec<f64>, counts: Vec<usize> },
    Matrix(CorrelationMatrix),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub data: ChartData,
}

/// Output settings shared by every chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub bins: usize,
    pub font_path: Option<PathBuf>,
}

impl From<&Config> for ChartOptions {
    fn from(config: &Config) -> Self {
        ChartOptions {
            title: config.chart_title.clone(),
            width: config.chart_width,
            height: config.chart_height,
            bins: config.histogram_bins,
            font_path: config.font_path.clone(),
        }
    }
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions::from(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// ChartHandle – the most recently rendered chart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChartHandle {
    spec: ChartSpec,
    options: ChartOptions,
}

impl ChartHandle {
    pub fn kind(&self) -> ChartKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &ChartSpec {
        &self.spec
    }

    /// Write the chart to `path` and return the path written. The extension
    /// picks the format: `.svg` is vector output, anything else must be a
    /// raster format the image encoder knows (`.png`, `.jpg`, `.bmp`). A path
    /// without an extension gets `.png` appended.
    pub fn export(&self, path: &Path) -> Result<PathBuf> {
        let path = if path.extension().is_none() {
            path.with_extension("png")
        } else {
            path.to_path_buf()
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let (w, h) = (self.options.width, self.options.height);
        let text = fonts::text_available(self.options.font_path.as_deref());

        if ext == "svg" {
            let root = SVGBackend::new(&path, (w, h)).into_drawing_area();
            draw::draw(&root, &self.spec, text)?;
        } else {
            let format = image::ImageFormat::from_extension(&ext)
                .with_context(|| format!("unsupported chart format '.{ext}'"))?;
            let mut buffer = vec![0u8; (w as usize) * (h as usize) * 3];
            {
                let root = BitMapBackend::with_buffer(&mut buffer, (w, h)).into_drawing_area();
                draw::draw(&root, &self.spec, text)?;
            }
            image::save_buffer_with_format(&path, &buffer, w, h, image::ColorType::Rgb8, format)
                .with_context(|| format!("writing {}", path.display()))?;
        }

        log::info!("Exported {} to {}", self.spec.kind, path.display());
        Ok(path)
    }
}

impl fmt::Display for ChartHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = &self.spec;
        let detail = match &spec.data {
            ChartData::Bars { labels, .. } => format!("{} bars", labels.len()),
            ChartData::Line { points, .. } => format!("{} points", points.len()),
            ChartData::Points(points) => format!("{} points", points.len()),
            ChartData::Slices { labels, .. } => format!("{} slices", labels.len()),
            ChartData::Bins { counts, .. } => format!("{} bins", counts.len()),
            ChartData::Matrix(m) => format!("{0}×{0} correlations", m.names.len()),
        };
        write!(
            f,
            "{} \"{}\": {} vs {} ({detail})",
            spec.kind, spec.title, spec.y_label, spec.x_label
        )
    }
}

// ---------------------------------------------------------------------------
// Rendering: dataset → handle
// ---------------------------------------------------------------------------

/// Extract the data slices for `kind` from `dataset` and wrap them in a handle.
pub fn render(
    kind: ChartKind,
    dataset: &Dataset,
    options: &ChartOptions,
) -> Result<ChartHandle, ChartError> {
    let missing = dataset.missing_columns(kind.required_columns());
    if !missing.is_empty() {
        return Err(ChartError::MissingColumns(missing));
    }

    let (x_label, y_label, data) = match kind {
        ChartKind::Bar => {
            let (labels, values) = grouped(dataset, "Region", "Sales", Aggregation::Mean);
            ("Region", "Sales", ChartData::Bars { labels, values })
        }
        ChartKind::Line => ("Date", "Sales", line_data(dataset)),
        ChartKind::Scatter => {
            let points = paired(dataset, "Sales", "Profit");
            ("Sales", "Profit", ChartData::Points(points))
        }
        ChartKind::Pie => {
            let (labels, values) = grouped(dataset, "Region", "Sales", Aggregation::Sum);
            ("Region", "Sales", ChartData::Slices { labels, values })
        }
        ChartKind::Histogram => {
            let values: Vec<f64> = present(dataset, "Sales");
            let (edges, counts) = histogram(&values, options.bins);
            ("Sales", "Count", ChartData::Bins { edges, counts })
        }
        ChartKind::Heatmap => {
            let matrix = dataset.correlation();
            if matrix.names.is_empty() {
                return Err(ChartError::NoNumericColumns);
            }
            ("", "", ChartData::Matrix(matrix))
        }
    };

    log::debug!("Rendered {kind} from {} rows", dataset.len());
    Ok(ChartHandle {
        spec: ChartSpec {
            kind,
            title: options.title.clone(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            data,
        },
        options: options.clone(),
    })
}

fn present(dataset: &Dataset, column: &str) -> Vec<f64> {
    dataset
        .column(column)
        .map(|c| c.as_numeric().iter().flatten().copied().collect())
        .unwrap_or_default()
}

fn paired(dataset: &Dataset, x: &str, y: &str) -> Vec<(f64, f64)> {
    let (Some(xs), Some(ys)) = (dataset.column(x), dataset.column(y)) else {
        return Vec::new();
    };
    xs.as_numeric()
        .iter()
        .zip(ys.as_numeric().iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect()
}

fn grouped(
    dataset: &Dataset,
    key: &str,
    target: &str,
    aggregation: Aggregation,
) -> (Vec<String>, Vec<f64>) {
    dataset
        .group_by(key)
        .and_then(|g| g.aggregate(target, aggregation))
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .unzip()
}

fn line_data(dataset: &Dataset) -> ChartData {
    let groups = dataset
        .group_by("Date")
        .and_then(|g| g.aggregate("Sales", Aggregation::Mean))
        .unwrap_or_default();

    let dated: Option<Vec<(NaiveDate, f64)>> = groups
        .iter()
        .map(|(key, value)| Some((parse_date(key)?, *value)))
        .collect();

    match dated {
        Some(mut dated) if !dated.is_empty() => {
            dated.sort_by_key(|(date, _)| *date);
            let origin = dated[0].0;
            let points = dated
                .iter()
                .map(|(date, value)| ((*date - origin).num_days() as f64, *value))
                .collect();
            ChartData::Line {
                points,
                axis: LineAxis::Dates { origin },
            }
        }
        _ => {
            let (labels, points) = groups
                .into_iter()
                .enumerate()
                .map(|(i, (key, value))| (key.to_string(), (i as f64, value)))
                .unzip();
            ChartData::Line {
                points,
                axis: LineAxis::Ordinal { labels },
            }
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    let CellValue::Text(s) = cell else {
        return None;
    };
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Equal-width bins over the value range; the last bin is closed on the right.
/// A degenerate range is widened by 0.5 on each side.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (mut lo, mut hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if finite.is_empty() {
        (lo, hi) = (0.0, 1.0);
    } else if lo == hi {
        (lo, hi) = (lo - 0.5, hi + 0.5);
    }

    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    (edges, counts)
}
