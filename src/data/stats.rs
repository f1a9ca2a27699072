use super::model::{Column, Dataset};

// ---------------------------------------------------------------------------
// Descriptive statistics over numeric columns
// ---------------------------------------------------------------------------

/// The classic `describe()` row set for one numeric column.
///
/// Statistics that are undefined for the column (e.g. `std` of a single value)
/// are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Summary {
    pub fn of(values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();
        present.sort_by(f64::total_cmp);
        Summary {
            count: present.len(),
            mean: mean(&present),
            std: variance(&present).sqrt(),
            min: present.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&present, 0.25),
            median: quantile(&present, 0.5),
            q75: quantile(&present, 0.75),
            max: present.last().copied().unwrap_or(f64::NAN),
        }
    }

    /// Row labels paired with values, in display order.
    pub fn rows(&self) -> [(&'static str, f64); 8] {
        [
            ("count", self.count as f64),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
        ]
    }
}

/// Pairwise Pearson correlation between numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major, `names.len()` × `names.len()`.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

impl Dataset {
    /// Summary statistics for every numeric column.
    pub fn describe(&self) -> Vec<(String, Summary)> {
        self.numeric_columns()
            .map(|c| (c.name.clone(), Summary::of(&c.as_numeric())))
            .collect()
    }

    /// Sample standard deviation per numeric column.
    pub fn std(&self) -> Vec<(String, f64)> {
        self.per_numeric_column(|v| variance(v).sqrt())
    }

    /// Sample variance per numeric column.
    pub fn var(&self) -> Vec<(String, f64)> {
        self.per_numeric_column(variance)
    }

    /// Correlation matrix over the numeric columns, using pairwise complete rows.
    pub fn correlation(&self) -> CorrelationMatrix {
        let columns: Vec<&Column> = self.numeric_columns().collect();
        let values = columns
            .iter()
            .map(|a| {
                columns
                    .iter()
                    .map(|b| pearson(&a.as_numeric(), &b.as_numeric()))
                    .collect()
            })
            .collect();
        CorrelationMatrix {
            names: columns.iter().map(|c| c.name.clone()).collect(),
            values,
        }
    }

    fn per_numeric_column(&self, f: impl Fn(&[f64]) -> f64) -> Vec<(String, f64)> {
        self.numeric_columns()
            .map(|c| {
                let present: Vec<f64> = c.as_numeric().iter().flatten().copied().collect();
                (c.name.clone(), f(&present))
            })
            .collect()
    }
}

// -- helpers over present (non-missing) values --

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (denominator `n - 1`).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn summary_matches_describe_conventions() {
        let s = Summary::of(&[Some(4.0), Some(1.0), None, Some(3.0), Some(2.0)]);
        assert_eq!(s.count, 4);
        assert!(approx(s.mean, 2.5));
        assert!(approx(s.std, (5.0f64 / 3.0).sqrt()));
        assert_eq!(s.min, 1.0);
        assert!(approx(s.q25, 1.75));
        assert!(approx(s.median, 2.5));
        assert!(approx(s.q75, 3.25));
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn summary_of_single_value_has_undefined_std() {
        let s = Summary::of(&[Some(7.0)]);
        assert_eq!(s.count, 1);
        assert!(s.std.is_nan());
        assert_eq!(s.median, 7.0);
    }

    #[test]
    fn std_and_var_skip_text_columns() {
        let ds = Dataset::new(vec![
            Column::text("Region", vec![Some("A".into()), Some("B".into())]),
            Column::numeric("Sales", vec![Some(100.0), Some(200.0)]),
        ])
        .unwrap();
        assert_eq!(ds.var(), vec![("Sales".to_string(), 5000.0)]);
        let std = ds.std();
        assert_eq!(std.len(), 1);
        assert!(approx(std[0].1, 5000.0f64.sqrt()));
    }

    #[test]
    fn correlation_of_linear_columns() {
        let ds = Dataset::new(vec![
            Column::numeric("x", vec![Some(1.0), Some(2.0), Some(3.0), None]),
            Column::numeric("y", vec![Some(2.0), Some(4.0), Some(6.0), Some(1.0)]),
            Column::numeric("z", vec![Some(3.0), Some(2.0), Some(1.0), Some(0.0)]),
        ])
        .unwrap();
        let corr = ds.correlation();
        assert!(approx(corr.get("x", "y").unwrap(), 1.0));
        assert!(approx(corr.get("x", "z").unwrap(), -1.0));
        assert!(approx(corr.get("y", "y").unwrap(), 1.0));
    }

    #[test]
    fn correlation_of_constant_column_is_undefined() {
        let ds = Dataset::new(vec![
            Column::numeric("x", vec![Some(1.0), Some(1.0)]),
            Column::numeric("y", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        assert!(ds.correlation().get("x", "y").unwrap().is_nan());
    }
}
