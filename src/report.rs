use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::group::{Aggregation, Groups};
use crate::data::model::{ColumnInfo, Dataset};
use crate::data::stats::Summary;

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Render string cells as a boxed terminal table.
fn table(headers: &[String], rows: &[Vec<String>]) -> Result<String, ArrowError> {
    let fields: Vec<Field> = headers
        .iter()
        .map(|h| Field::new(h, DataType::Utf8, true))
        .collect();
    let arrays: Vec<ArrayRef> = (0..headers.len())
        .map(|c| {
            let column: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(c).map(String::as_str))
                .collect();
            Arc::new(StringArray::from(column)) as ArrayRef
        })
        .collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

fn write_table(f: &mut fmt::Formatter<'_>, headers: &[String], rows: &[Vec<String>]) -> fmt::Result {
    let rendered = table(headers, rows).map_err(|_| fmt::Error)?;
    writeln!(f, "{rendered}")
}

/// Numbers the way the reports show them: up to six decimals, no trailing zeros.
pub fn fmt_number(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0');
    let s = s.strip_suffix('.').map(|t| format!("{t}.0")).unwrap_or_else(|| s.to_string());
    if s == "-0.0" { "0.0".to_string() } else { s }
}

fn write_summaries(f: &mut fmt::Formatter<'_>, summaries: &[(String, Summary)]) -> fmt::Result {
    if summaries.is_empty() {
        return writeln!(f, "(no numeric columns)");
    }
    let headers: Vec<String> = std::iter::once(String::new())
        .chain(summaries.iter().map(|(name, _)| name.clone()))
        .collect();
    let rows: Vec<Vec<String>> = (0..8)
        .map(|r| {
            let label = summaries[0].1.rows()[r].0.to_string();
            std::iter::once(label)
                .chain(summaries.iter().map(|(_, s)| fmt_number(s.rows()[r].1)))
                .collect()
        })
        .collect();
    write_table(f, &headers, &rows)
}

fn write_series(f: &mut fmt::Formatter<'_>, values: &[(String, f64)]) -> fmt::Result {
    for (name, v) in values {
        writeln!(f, "{name:<24} {}", fmt_number(*v))?;
    }
    Ok(())
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &[(String, usize)]) -> fmt::Result {
    for (name, n) in counts {
        writeln!(f, "{name:<24} {n}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset loaded successfully! ({} rows × {} columns from {})",
            self.rows,
            self.columns,
            self.path.display()
        )
    }
}

// ---------------------------------------------------------------------------
// Explore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExploreReport {
    pub preview: Dataset,
    pub rows: usize,
    pub info: Vec<ColumnInfo>,
    pub summary: Vec<(String, Summary)>,
}

impl ExploreReport {
    pub fn new(dataset: &Dataset, preview_rows: usize) -> Self {
        ExploreReport {
            preview: dataset.head(preview_rows),
            rows: dataset.len(),
            info: dataset.info(),
            summary: dataset.describe(),
        }
    }
}

impl fmt::Display for ExploreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n--- First {} Rows ---", self.preview.len())?;
        // Arrow refuses a batch without columns.
        match self.preview.to_record_batch() {
            Ok(batch) => {
                let preview = pretty_format_batches(&[batch]).map_err(|_| fmt::Error)?;
                writeln!(f, "{preview}")?;
            }
            Err(_) => writeln!(f, "(no columns)")?,
        }

        writeln!(f, "\n--- Data Info ---")?;
        writeln!(f, "{} entries, {} columns", self.rows, self.info.len())?;
        let headers = ["#", "Column", "Non-Null Count", "Dtype"].map(String::from);
        let rows: Vec<Vec<String>> = self
            .info
            .iter()
            .enumerate()
            .map(|(i, c)| {
                vec![
                    i.to_string(),
                    c.name.clone(),
                    format!("{} non-null", c.non_null),
                    c.kind.to_string(),
                ]
            })
            .collect();
        write_table(f, &headers, &rows)?;

        writeln!(f, "\n--- Descriptive Statistics ---")?;
        write_summaries(f, &self.summary)
    }
}

// ---------------------------------------------------------------------------
// Derive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DeriveReport {
    pub column: String,
    /// Rows whose result is missing (missing input or 0/0).
    pub undefined: usize,
    /// Rows whose result is ±inf (division by zero).
    pub infinite: usize,
}

impl fmt::Display for DeriveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Added new column: '{}'", self.column)?;
        if self.undefined > 0 || self.infinite > 0 {
            write!(
                f,
                " ({} undefined, {} infinite values)",
                self.undefined, self.infinite
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    pub before: Vec<(String, usize)>,
    /// Numeric columns that had cells filled: (column, fill value, cells filled).
    pub filled: Vec<(String, f64, usize)>,
    pub after: Vec<(String, usize)>,
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nMissing values before cleaning:")?;
        write_counts(f, &self.before)?;
        writeln!(f, "\nMissing values after cleaning:")?;
        write_counts(f, &self.after)
    }
}

// ---------------------------------------------------------------------------
// Aggregate / describe
// ---------------------------------------------------------------------------

/// One grouped aggregate, or the reason it was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAggregate {
    pub key: String,
    pub target: String,
    pub aggregation: Aggregation,
    /// `None` when `missing` names absent columns.
    pub groups: Option<Groups>,
    pub missing: Vec<String>,
}

impl GroupedAggregate {
    pub fn compute(dataset: &Dataset, key: &str, target: &str, aggregation: Aggregation) -> Self {
        let groups = dataset
            .group_by(key)
            .and_then(|g| g.aggregate(target, aggregation));
        GroupedAggregate {
            key: key.to_string(),
            target: target.to_string(),
            aggregation,
            missing: dataset.missing_columns(&[key, target]),
            groups,
        }
    }
}

impl fmt::Display for GroupedAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.aggregation {
            Aggregation::Sum => format!("Total {} by {}:", self.target, self.key),
            Aggregation::Mean => format!("Average {} by {}:", self.target, self.key),
        };
        writeln!(f, "{title}")?;
        match &self.groups {
            Some(groups) => {
                for (key, value) in groups {
                    writeln!(f, "{:<24} {}", key.to_string(), fmt_number(*value))?;
                }
                Ok(())
            }
            None => writeln!(f, "(unavailable: missing column(s) {})", self.missing.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub sales_by_region: GroupedAggregate,
    pub profit_by_product: GroupedAggregate,
    pub summary: Vec<(String, Summary)>,
    pub std: Vec<(String, f64)>,
    pub var: Vec<(String, f64)>,
}

impl AggregateReport {
    pub fn new(dataset: &Dataset) -> Self {
        AggregateReport {
            sales_by_region: GroupedAggregate::compute(dataset, "Region", "Sales", Aggregation::Sum),
            profit_by_product: GroupedAggregate::compute(
                dataset,
                "Product",
                "Profit",
                Aggregation::Mean,
            ),
            summary: dataset.describe(),
            std: dataset.std(),
            var: dataset.var(),
        }
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n--- Aggregation Examples ---")?;
        write!(f, "{}", self.sales_by_region)?;
        writeln!(f)?;
        write!(f, "{}", self.profit_by_product)?;

        writeln!(f, "\n--- Statistical Summary ---")?;
        write_summaries(f, &self.summary)?;
        writeln!(f, "\nStandard Deviation:")?;
        write_series(f, &self.std)?;
        writeln!(f, "\nVariance:")?;
        write_series(f, &self.var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Column::text("Region", vec![Some("A".into()), Some("B".into())]),
            Column::numeric("Sales", vec![Some(100.0), Some(200.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(fmt_number(100.0), "100.0");
        assert_eq!(fmt_number(2.5), "2.5");
        assert_eq!(fmt_number(1.0 / 3.0), "0.333333");
        assert_eq!(fmt_number(f64::NAN), "NaN");
        assert_eq!(fmt_number(f64::NEG_INFINITY), "-inf");
        assert_eq!(fmt_number(-0.0), "0.0");
    }

    #[test]
    fn explore_report_lists_every_column() {
        let report = ExploreReport::new(&dataset(), 5);
        assert_eq!(report.preview.len(), 2);
        assert_eq!(report.info.len(), 2);
        assert_eq!(report.summary.len(), 1);

        let text = report.to_string();
        assert!(text.contains("First 2 Rows"));
        assert!(text.contains("2 non-null"));
        assert!(text.contains("float64"));
        assert!(text.contains("object"));
        assert!(text.contains("25%"));
    }

    #[test]
    fn unavailable_aggregate_names_missing_columns() {
        let report = AggregateReport::new(&dataset());
        assert!(report.sales_by_region.groups.is_some());
        assert_eq!(report.profit_by_product.groups, None);
        assert_eq!(
            report.profit_by_product.missing,
            vec!["Product".to_string(), "Profit".to_string()]
        );
        let text = report.to_string();
        assert!(text.contains("Total Sales by Region:"));
        assert!(text.contains("unavailable: missing column(s) Product, Profit"));
        assert!(text.contains("Variance:"));
    }

    #[test]
    fn clean_report_prints_before_and_after() {
        let report = CleanReport {
            before: vec![("Sales".into(), 2)],
            filled: vec![("Sales".into(), 10.0, 2)],
            after: vec![("Sales".into(), 0)],
        };
        let text = report.to_string();
        let before = text.find("before cleaning").unwrap();
        let after = text.find("after cleaning").unwrap();
        assert!(before < after);
    }
}
