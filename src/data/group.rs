use std::collections::BTreeMap;
use std::fmt;

use super::model::{CellValue, Column, Dataset};

// ---------------------------------------------------------------------------
// Group-by: reduce a target column per distinct key value
// ---------------------------------------------------------------------------

/// Reduction applied to each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Mean => write!(f, "mean"),
        }
    }
}

/// Per-group results ordered by key.
pub type Groups = BTreeMap<CellValue, f64>;

/// Rows of a dataset partitioned by the values of one key column.
pub struct GroupBy<'a> {
    dataset: &'a Dataset,
    key: &'a Column,
}

impl Dataset {
    /// Group rows by `key`. `None` if the column does not exist.
    pub fn group_by<'a>(&'a self, key: &str) -> Option<GroupBy<'a>> {
        let key = self.column(key)?;
        Some(GroupBy { dataset: self, key })
    }
}

impl GroupBy<'_> {
    /// Reduce `target` per group. `None` if the target column does not exist.
    ///
    /// Rows with a missing key are dropped. Missing target values are skipped:
    /// an all-missing group sums to `0` and has a `NaN` mean.
    pub fn aggregate(&self, target: &str, aggregation: Aggregation) -> Option<Groups> {
        let values = self.dataset.column(target)?.as_numeric();

        let mut acc: BTreeMap<CellValue, (f64, usize)> = BTreeMap::new();
        for (row, value) in values.iter().enumerate() {
            let key = self.key.cell(row);
            if key.is_null() {
                continue;
            }
            let entry = acc.entry(key).or_insert((0.0, 0));
            if let Some(v) = value {
                entry.0 += v;
                entry.1 += 1;
            }
        }

        Some(
            acc.into_iter()
                .map(|(key, (sum, count))| {
                    let value = match aggregation {
                        Aggregation::Sum => sum,
                        Aggregation::Mean if count == 0 => f64::NAN,
                        Aggregation::Mean => sum / count as f64,
                    };
                    (key, value)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Dataset {
        Dataset::new(vec![
            Column::text(
                "Region",
                vec![
                    Some("East".into()),
                    Some("West".into()),
                    Some("East".into()),
                    None,
                    Some("North".into()),
                ],
            ),
            Column::numeric(
                "Sales",
                vec![Some(10.0), Some(5.0), Some(30.0), Some(99.0), None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn sums_per_key_and_drops_missing_keys() {
        let ds = sales();
        let groups = ds
            .group_by("Region")
            .unwrap()
            .aggregate("Sales", Aggregation::Sum)
            .unwrap();
        let keys: Vec<String> = groups.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["East", "North", "West"]);
        assert_eq!(groups[&CellValue::from("East")], 40.0);
        assert_eq!(groups[&CellValue::from("North")], 0.0);
    }

    #[test]
    fn mean_of_all_missing_group_is_nan() {
        let ds = sales();
        let groups = ds
            .group_by("Region")
            .unwrap()
            .aggregate("Sales", Aggregation::Mean)
            .unwrap();
        assert_eq!(groups[&CellValue::from("East")], 20.0);
        assert!(groups[&CellValue::from("North")].is_nan());
    }

    #[test]
    fn unknown_columns_yield_none() {
        let ds = sales();
        assert!(ds.group_by("Product").is_none());
        assert!(ds
            .group_by("Region")
            .unwrap()
            .aggregate("Profit", Aggregation::Sum)
            .is_none());
    }
}
