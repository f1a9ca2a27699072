use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, bail};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
/// Group keys live in `BTreeMap`s downstream so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

// -- Manual Eq/Ord so we can use CellValue as a BTreeMap key --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Number(_) => 1,
                Text(_) => 2,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Number(a), Number(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Number(f) => f.to_bits().hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Null => write!(f, "NaN"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl CellValue {
    /// Interpret the value as an `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Column – a named, homogeneously typed sequence of cells
// ---------------------------------------------------------------------------

/// The inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "float64"),
            ColumnKind::Text => write!(f, "object"),
        }
    }
}

/// Column storage. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        // NaN never survives as a value: it is a missing cell.
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Column {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    /// Build a column from loosely typed cells.
    ///
    /// The column is numeric when every non-null cell is a number, otherwise
    /// every cell is kept as text.
    pub fn from_cells(name: impl Into<String>, cells: Vec<CellValue>) -> Self {
        if cells
            .iter()
            .all(|c| matches!(c, CellValue::Number(_) | CellValue::Null))
        {
            let values = cells.iter().map(CellValue::as_f64).collect();
            Column::numeric(name, values)
        } else {
            let values = cells
                .into_iter()
                .map(|c| match c {
                    CellValue::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Column::text(name, values)
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn null_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn non_null_count(&self) -> usize {
        self.len() - self.null_count()
    }

    pub fn cell(&self, row: usize) -> CellValue {
        match &self.data {
            ColumnData::Numeric(v) => match v.get(row).copied().flatten() {
                Some(x) => CellValue::Number(x),
                None => CellValue::Null,
            },
            ColumnData::Text(v) => match v.get(row).cloned().flatten() {
                Some(s) => CellValue::Text(s),
                None => CellValue::Null,
            },
        }
    }

    /// Numeric view of the column. Textual cells count as missing.
    pub fn as_numeric(&self) -> Cow<'_, [Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Cow::Borrowed(v.as_slice()),
            ColumnData::Text(v) => Cow::Owned(vec![None; v.len()]),
        }
    }

    /// Arithmetic mean of the non-missing values, `None` if there are none.
    pub fn mean(&self) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => {
                let present: Vec<f64> = v.iter().flatten().copied().collect();
                if present.is_empty() {
                    None
                } else {
                    Some(present.iter().sum::<f64>() / present.len() as f64)
                }
            }
            ColumnData::Text(_) => None,
        }
    }

    fn slice(&self, len: usize) -> Column {
        let data = match &self.data {
            ColumnData::Numeric(v) => ColumnData::Numeric(v.iter().take(len).copied().collect()),
            ColumnData::Text(v) => ColumnData::Text(v.iter().take(len).cloned().collect()),
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }

    fn to_arrow(&self) -> (Field, ArrayRef) {
        match &self.data {
            ColumnData::Numeric(v) => (
                Field::new(&self.name, DataType::Float64, true),
                Arc::new(Float64Array::from(v.clone())) as ArrayRef,
            ),
            ColumnData::Text(v) => (
                Field::new(&self.name, DataType::Utf8, true),
                Arc::new(StringArray::from(
                    v.iter().map(|s| s.as_deref()).collect::<Vec<_>>(),
                )) as ArrayRef,
            ),
        }
    }
}

/// Per-column metadata shown by the explore report.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub non_null: usize,
    pub kind: ColumnKind,
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// An ordered set of equally long named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Assemble a dataset, checking that all columns have the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        for col in &columns {
            if col.len() != rows {
                bail!(
                    "column '{}' has {} values but '{}' has {rows}",
                    col.name,
                    col.len(),
                    columns[0].name
                );
            }
        }
        Ok(Dataset { columns, rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn info(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                non_null: c.non_null_count(),
                kind: c.kind(),
            })
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names from `required` that are not present, in the given order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.kind() == ColumnKind::Numeric)
    }

    /// Missing-value count for every column, in column order.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.null_count()))
            .collect()
    }

    pub fn column_mean(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(Column::mean)
    }

    /// Replace the missing cells of a numeric column with `value`.
    /// Returns how many cells were filled; textual columns are left alone.
    pub fn fill_missing(&mut self, name: &str, value: f64) -> usize {
        let Some(col) = self.columns.iter_mut().find(|c| c.name == name) else {
            return 0;
        };
        match &mut col.data {
            ColumnData::Numeric(values) => {
                let mut filled = 0;
                for cell in values.iter_mut().filter(|c| c.is_none()) {
                    *cell = Some(value);
                    filled += 1;
                }
                filled
            }
            ColumnData::Text(_) => 0,
        }
    }

    /// Overwrite the column named `column.name` in place, or append it.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.rows {
            bail!(
                "column '{}' has {} values but the dataset has {} rows",
                column.name,
                column.len(),
                self.rows
            );
        }
        if self.columns.is_empty() {
            self.rows = column.len();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Compute a numeric column row by row and store it under `name`,
    /// overwriting an existing column of that name.
    pub fn derive_numeric(&mut self, name: &str, f: impl Fn(usize) -> Option<f64>) {
        let column = Column::numeric(name, (0..self.rows).map(f).collect());
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// The first `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> Dataset {
        let len = n.min(self.rows);
        Dataset {
            columns: self.columns.iter().map(|c| c.slice(len)).collect(),
            rows: len,
        }
    }

    /// Arrow view of the table, used for pretty printing.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) =
            self.columns.iter().map(Column::to_arrow).unzip();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::text("Region", vec![Some("A".into()), None, Some("B".into())]),
            Column::numeric("Sales", vec![Some(1.0), None, Some(3.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn from_cells_infers_numeric_and_text() {
        let numeric = Column::from_cells(
            "n",
            vec![CellValue::Number(1.0), CellValue::Null, CellValue::Number(2.5)],
        );
        assert_eq!(numeric.kind(), ColumnKind::Numeric);
        assert_eq!(numeric.null_count(), 1);

        let mixed = Column::from_cells("m", vec![CellValue::Number(1.0), "x".into()]);
        assert_eq!(mixed.kind(), ColumnKind::Text);
        assert_eq!(mixed.cell(0), CellValue::Text("1".into()));
    }

    #[test]
    fn nan_is_stored_as_missing() {
        let col = Column::numeric("x", vec![Some(f64::NAN), Some(1.0)]);
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(1.0), Some(2.0)]),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn info_reports_kind_and_non_null_counts() {
        let info = sample().info();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].kind, ColumnKind::Text);
        assert_eq!(info[0].non_null, 2);
        assert_eq!(info[1].kind, ColumnKind::Numeric);
        assert_eq!(info[1].non_null, 2);
    }

    #[test]
    fn fill_missing_only_touches_numeric_columns() {
        let mut ds = sample();
        assert_eq!(ds.fill_missing("Sales", 2.0), 1);
        assert_eq!(ds.fill_missing("Region", 2.0), 0);
        assert_eq!(
            ds.missing_counts(),
            vec![("Region".to_string(), 1), ("Sales".to_string(), 0)]
        );
    }

    #[test]
    fn set_column_overwrites_in_place() {
        let mut ds = sample();
        ds.set_column(Column::numeric("Sales", vec![Some(9.0); 3]))
            .unwrap();
        assert_eq!(ds.column_names(), vec!["Region", "Sales"]);
        assert_eq!(ds.column_mean("Sales"), Some(9.0));

        assert!(ds.set_column(Column::numeric("Short", vec![Some(1.0)])).is_err());
        assert_eq!(ds.width(), 2);
    }

    #[test]
    fn derive_numeric_appends_then_overwrites() {
        let mut ds = sample();
        ds.derive_numeric("Double", |row| Some(row as f64 * 2.0));
        assert_eq!(ds.column_names(), vec!["Region", "Sales", "Double"]);
        ds.derive_numeric("Double", |_| None);
        assert_eq!(ds.width(), 3);
        assert_eq!(ds.column("Double").unwrap().null_count(), 3);
    }

    #[test]
    fn cell_ordering_puts_null_first() {
        let mut cells = vec![
            CellValue::Text("b".into()),
            CellValue::Null,
            CellValue::Number(2.0),
            CellValue::Text("a".into()),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                CellValue::Null,
                CellValue::Number(2.0),
                CellValue::Text("a".into()),
                CellValue::Text("b".into()),
            ]
        );
    }

    #[test]
    fn head_limits_rows_and_converts_to_arrow() {
        let ds = sample();
        let head = ds.head(2);
        assert_eq!(head.len(), 2);
        let batch = head.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 2);
    }
}
