use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Column, Dataset};

/// Cell spellings read as a missing value.
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>",
];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a tabular dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – flat primitive columns
/// * `.json`            – `[{ "Region": "East", "Sales": 120.5, ... }, ...]`
/// * `.tsv`             – tab-delimited with a header row
/// * anything else      – comma-delimited with a header row
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "tsv" => load_delimited(path, b'\t'),
        _ => load_delimited(path, b','),
    }?;

    log::debug!(
        "Parsed {} ({} rows × {} columns)",
        path.display(),
        dataset.len(),
        dataset.width()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV / TSV loader
// ---------------------------------------------------------------------------

fn load_delimited(path: &Path, delimiter: u8) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_delimited(file, delimiter)
}

/// Header row with column names; each column's type is inferred from its cells.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, value) in record.iter().enumerate() {
            let value = (!NA_VALUES.contains(&value)).then(|| value.to_string());
            raw[col_idx].push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    Dataset::new(columns)
}

/// Numeric when every present cell parses as a number; otherwise the cells
/// keep their spelling as text.
fn infer_column(name: String, values: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = values
        .iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => s.parse::<f64>().ok().map(Some),
        })
        .collect();
    match parsed {
        Some(numbers) => Column::numeric(name, numbers),
        None => Column::text(name, values),
    }
}

fn columns_to_dataset(columns: impl IntoIterator<Item = (String, Vec<CellValue>)>) -> Result<Dataset> {
    let columns = columns
        .into_iter()
        .map(|(name, cells)| Column::from_cells(name, cells))
        .collect();
    Dataset::new(columns)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Region": "East", "Product": "Widget", "Sales": 120.5, "Profit": 20.1 },
///   ...
/// ]
/// ```
///
/// Keys absent from a record are missing values for that row.
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_json_records(&text)
}

pub fn parse_json_records(text: &str) -> Result<Dataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    // Column order follows first appearance across records.
    let mut order: Vec<String> = Vec::new();
    let mut cells: BTreeMap<String, Vec<CellValue>> = BTreeMap::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for key in obj.keys() {
            if !cells.contains_key(key) {
                order.push(key.clone());
                cells.insert(key.clone(), vec![CellValue::Null; i]);
            }
        }
        for key in &order {
            let value = obj.get(key).map(json_to_cell).unwrap_or(CellValue::Null);
            if let Some(column) = cells.get_mut(key) {
                column.push(value);
            }
        }
    }

    columns_to_dataset(order.into_iter().map(|name| {
        let column = cells.remove(&name).unwrap_or_default();
        (name, column)
    }))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::Null => CellValue::Null,
        JsonValue::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
        JsonValue::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns.
///
/// Numeric Arrow types become numeric columns; every other type is rendered
/// to text through Arrow's cast kernel. Works with files written by both
/// **Pandas** (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;

    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column) in batch.columns().iter().enumerate() {
            let values = arrow_to_cells(column.as_ref())
                .with_context(|| format!("decoding column '{}'", names[col_idx]))?;
            cells[col_idx].extend(values);
        }
    }

    columns_to_dataset(names.into_iter().zip(cells))
}

fn arrow_to_cells(array: &dyn Array) -> Result<Vec<CellValue>> {
    let data_type = array.data_type();
    if data_type.is_numeric() {
        let floats = cast(array, &DataType::Float64)?;
        let floats = floats.as_primitive::<Float64Type>();
        Ok(floats
            .iter()
            .map(|v| match v {
                Some(f) if !f.is_nan() => CellValue::Number(f),
                _ => CellValue::Null,
            })
            .collect())
    } else if matches!(data_type, DataType::List(_) | DataType::LargeList(_) | DataType::Struct(_)) {
        bail!("nested column type {data_type:?} is not supported")
    } else {
        let text = cast(array, &DataType::Utf8)?;
        let text = text.as_string::<i32>();
        Ok(text
            .iter()
            .map(|v| match v {
                Some(s) => CellValue::Text(s.to_string()),
                None => CellValue::Null,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ColumnKind;

    #[test]
    fn csv_infers_types_and_missing_values() {
        let csv = "Region,Sales,Note\nEast, 10.5 ,ok\nWest,NA,\nEast,7,n/a\n";
        let ds = read_delimited(csv.as_bytes(), b',').unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.column_names(), vec!["Region", "Sales", "Note"]);
        assert_eq!(ds.column("Region").unwrap().kind(), ColumnKind::Text);
        let sales = ds.column("Sales").unwrap();
        assert_eq!(sales.kind(), ColumnKind::Numeric);
        assert_eq!(sales.as_numeric().to_vec(), vec![Some(10.5), None, Some(7.0)]);
        assert_eq!(ds.column("Note").unwrap().null_count(), 2);
    }

    #[test]
    fn mixed_column_keeps_original_spelling() {
        let csv = "Product,Sales\n007,1\nA12,2\n1.50,3\n-,4\n";
        let ds = read_delimited(csv.as_bytes(), b',').unwrap();
        let product = ds.column("Product").unwrap();
        assert_eq!(product.kind(), ColumnKind::Text);
        let cells: Vec<CellValue> = (0..4).map(|row| product.cell(row)).collect();
        assert_eq!(
            cells,
            vec![
                CellValue::from("007"),
                CellValue::from("A12"),
                CellValue::from("1.50"),
                CellValue::from("-"),
            ]
        );
    }

    #[test]
    fn leading_zero_codes_stay_distinct_groups() {
        let csv = "Product,Sales\n007,1\n7,2\nX,3\n";
        let ds = read_delimited(csv.as_bytes(), b',').unwrap();
        let groups = ds
            .group_by("Product")
            .unwrap()
            .aggregate("Sales", crate::data::group::Aggregation::Sum)
            .unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&CellValue::from("007")], 1.0);
        assert_eq!(groups[&CellValue::from("7")], 2.0);
    }

    #[test]
    fn ragged_csv_is_an_error() {
        let csv = "a,b\n1,2\n3\n";
        assert!(read_delimited(csv.as_bytes(), b',').is_err());
    }

    #[test]
    fn tab_delimited_input() {
        let tsv = "Product\tProfit\nX\t20\nY\t50\n";
        let ds = read_delimited(tsv.as_bytes(), b'\t').unwrap();
        assert_eq!(ds.column_mean("Profit"), Some(35.0));
    }

    #[test]
    fn json_records_fill_absent_keys_with_missing() {
        let json = r#"[
            {"Region": "A", "Sales": 100},
            {"Region": "B", "Sales": null, "Profit": 5.5},
            {"Region": "C", "Sales": 300}
        ]"#;
        let ds = parse_json_records(json).unwrap();
        assert_eq!(ds.column_names(), vec!["Region", "Sales", "Profit"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.column("Sales").unwrap().null_count(), 1);
        assert_eq!(
            ds.column("Profit").unwrap().as_numeric().to_vec(),
            vec![None, Some(5.5), None]
        );
    }

    #[test]
    fn json_must_be_an_array_of_objects() {
        assert!(parse_json_records(r#"{"Region": "A"}"#).is_err());
        assert!(parse_json_records(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn missing_file_reports_io_not_found() {
        let err = load_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        let io = err
            .chain()
            .find_map(|e| e.downcast_ref::<std::io::Error>())
            .unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
