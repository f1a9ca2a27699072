use std::path::{Path, PathBuf};

use crate::chart::{self, ChartError, ChartHandle, ChartKind, ChartOptions};
use crate::config::Config;
use crate::data::loader;
use crate::data::model::Dataset;
use crate::error::{SessionError, SessionResult};
use crate::report::{AggregateReport, CleanReport, DeriveReport, ExploreReport, LoadReport};

/// Name of the derived margin column.
pub const PROFIT_MARGIN: &str = "Profit Margin %";

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Which operations are currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No dataset loaded.
    Empty,
    /// Dataset present, no chart.
    Loaded,
    /// Dataset and chart present.
    Plotted,
    /// `close` was called; nothing is valid any more.
    Closed,
}

/// One analysis session: at most one dataset and at most one chart.
///
/// Every operation either commits fully or leaves the session untouched.
pub struct Session {
    dataset: Option<Dataset>,
    chart: Option<ChartHandle>,
    chart_options: ChartOptions,
    preview_rows: usize,
    closed: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(&Config::default())
    }
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Session {
            dataset: None,
            chart: None,
            chart_options: ChartOptions::from(config),
            preview_rows: config.preview_rows,
            closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match (self.closed, &self.dataset, &self.chart) {
            (true, _, _) => SessionState::Closed,
            (false, None, _) => SessionState::Empty,
            (false, Some(_), None) => SessionState::Loaded,
            (false, Some(_), Some(_)) => SessionState::Plotted,
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn chart(&self) -> Option<&ChartHandle> {
        self.chart.as_ref()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn data(&self) -> SessionResult<&Dataset> {
        self.ensure_open()?;
        self.dataset.as_ref().ok_or(SessionError::NoDatasetLoaded)
    }

    fn data_mut(&mut self) -> SessionResult<&mut Dataset> {
        self.ensure_open()?;
        self.dataset.as_mut().ok_or(SessionError::NoDatasetLoaded)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Load a dataset, replacing the current one and discarding any chart.
    /// On failure nothing changes.
    pub fn load(&mut self, path: impl AsRef<Path>) -> SessionResult<LoadReport> {
        self.ensure_open()?;
        let path = path.as_ref();

        let dataset = loader::load_file(path).map_err(|err| {
            log::error!("Failed to load {}: {err:#}", path.display());
            if is_not_found(&err) {
                SessionError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SessionError::Unreadable {
                    path: path.to_path_buf(),
                    source: err,
                }
            }
        })?;

        log::info!(
            "Loaded {} rows with columns {:?}",
            dataset.len(),
            dataset.column_names()
        );
        let report = LoadReport {
            path: path.to_path_buf(),
            rows: dataset.len(),
            columns: dataset.width(),
        };
        self.dataset = Some(dataset);
        self.chart = None;
        Ok(report)
    }

    /// Preview rows, column metadata and descriptive statistics.
    pub fn explore(&self) -> SessionResult<ExploreReport> {
        let dataset = self.data()?;
        Ok(ExploreReport::new(dataset, self.preview_rows))
    }

    /// Add (or overwrite) `Profit Margin %` = `Profit / Sales * 100`.
    ///
    /// A missing input or `0 / 0` gives a missing value; any other division
    /// by zero gives `±inf`.
    pub fn derive_profit_margin(&mut self) -> SessionResult<DeriveReport> {
        let dataset = self.data_mut()?;
        let (Some(sales), Some(profit)) = (dataset.column("Sales"), dataset.column("Profit")) else {
            return Err(SessionError::MissingColumns {
                columns: dataset.missing_columns(&["Sales", "Profit"]),
            });
        };
        let (sales, profit) = (sales.as_numeric().into_owned(), profit.as_numeric().into_owned());
        dataset.derive_numeric(PROFIT_MARGIN, |row| {
            let margin = profit[row]? / sales[row]? * 100.0;
            (!margin.is_nan()).then_some(margin)
        });

        let margin = dataset
            .column(PROFIT_MARGIN)
            .map(|c| c.as_numeric().into_owned())
            .unwrap_or_default();
        let report = DeriveReport {
            column: PROFIT_MARGIN.to_string(),
            undefined: margin.iter().filter(|v| v.is_none()).count(),
            infinite: margin.iter().flatten().filter(|v| v.is_infinite()).count(),
        };
        log::info!("{report}");
        Ok(report)
    }

    /// Fill missing numeric cells with their column's mean.
    pub fn clean(&mut self) -> SessionResult<CleanReport> {
        let dataset = self.data_mut()?;
        let before = dataset.missing_counts();

        // Means come from the pre-cleaning values of each column.
        let means: Vec<(String, f64)> = dataset
            .numeric_columns()
            .filter(|c| c.null_count() > 0)
            .filter_map(|c| Some((c.name.clone(), c.mean()?)))
            .collect();

        let mut filled = Vec::with_capacity(means.len());
        for (name, mean) in means {
            let count = dataset.fill_missing(&name, mean);
            log::debug!("Filled {count} missing value(s) in '{name}' with {mean}");
            filled.push((name, mean, count));
        }

        Ok(CleanReport {
            before,
            filled,
            after: dataset.missing_counts(),
        })
    }

    /// Grouped aggregates plus whole-table statistics.
    pub fn aggregate(&self) -> SessionResult<AggregateReport> {
        let dataset = self.data()?;
        let report = AggregateReport::new(dataset);
        for grouped in [&report.sales_by_region, &report.profit_by_product] {
            if grouped.groups.is_none() {
                log::warn!(
                    "Skipping {} of {} by {}: missing {:?}",
                    grouped.aggregation,
                    grouped.target,
                    grouped.key,
                    grouped.missing
                );
            }
        }
        Ok(report)
    }

    /// Draw a chart of `kind` and make it the current chart.
    pub fn visualize(&mut self, kind: ChartKind) -> SessionResult<&ChartHandle> {
        let dataset = self.data()?;
        let handle = chart::render(kind, dataset, &self.chart_options).map_err(|err| {
            log::warn!("Cannot draw {kind}: {err}");
            match err {
                ChartError::MissingColumns(columns) => SessionError::MissingColumns { columns },
                ChartError::NoNumericColumns => SessionError::NoNumericColumns,
            }
        })?;
        Ok(self.chart.insert(handle))
    }

    /// Export the current chart and return the path written. The handle is
    /// kept for further saves.
    pub fn save(&self, path: impl AsRef<Path>) -> SessionResult<PathBuf> {
        self.ensure_open()?;
        let chart = self.chart.as_ref().ok_or(SessionError::NoChartAvailable)?;
        let path = path.as_ref();
        chart.export(path).map_err(|source| SessionError::Export {
            path: path.to_path_buf(),
            source,
        })
    }

    /// End the session, dropping the dataset and chart. Returns whether this
    /// call closed it; later calls are no-ops.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        log::info!("Cleaning up resources...");
        self.dataset = None;
        self.chart = None;
        self.closed = true;
        true
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<std::io::Error>())
        .any(|e| e.kind() == std::io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn loaded(contents: &str) -> (Session, tempfile::NamedTempFile) {
        let file = csv_file(contents);
        let mut session = Session::default();
        session.load(file.path()).unwrap();
        (session, file)
    }

    #[test]
    fn empty_session_rejects_everything_but_load() {
        let mut session = Session::default();
        assert!(matches!(session.explore(), Err(SessionError::NoDatasetLoaded)));
        assert!(matches!(
            session.derive_profit_margin(),
            Err(SessionError::NoDatasetLoaded)
        ));
        assert!(matches!(session.clean(), Err(SessionError::NoDatasetLoaded)));
        assert!(matches!(session.aggregate(), Err(SessionError::NoDatasetLoaded)));
        for kind in ChartKind::ALL {
            assert!(matches!(
                session.visualize(kind),
                Err(SessionError::NoDatasetLoaded)
            ));
        }
        assert!(matches!(
            session.save("out.png"),
            Err(SessionError::NoChartAvailable)
        ));
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn load_moves_to_loaded_and_discards_chart() {
        let (mut session, file) = loaded("Region,Sales\nA,1\nB,2\n");
        assert_eq!(session.state(), SessionState::Loaded);
        session.visualize(ChartKind::Bar).unwrap();
        assert_eq!(session.state(), SessionState::Plotted);

        session.load(file.path()).unwrap();
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(session.chart().is_none());
    }

    #[test]
    fn failed_load_keeps_previous_state() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\nB,2\n");
        session.visualize(ChartKind::Pie).unwrap();
        let before = session.dataset().cloned();

        let err = session.load("/no/such/file.csv").unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
        assert!(err.is_load_failure());
        assert_eq!(session.dataset().cloned(), before);
        assert_eq!(session.state(), SessionState::Plotted);
    }

    #[test]
    fn unparsable_file_is_unreadable() {
        let file = csv_file("a,b\n1,2\n3\n");
        let mut session = Session::default();
        let err = session.load(file.path()).unwrap_err();
        assert!(matches!(err, SessionError::Unreadable { .. }));
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[test]
    fn derive_requires_sales_and_profit() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\n");
        let before = session.dataset().cloned();
        let err = session.derive_profit_margin().unwrap_err();
        match err {
            SessionError::MissingColumns { columns } => assert_eq!(columns, vec!["Profit"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.dataset().cloned(), before);
    }

    #[test]
    fn derive_handles_zero_and_missing_sales() {
        let (mut session, _file) = loaded("Sales,Profit\n200,50\n0,10\n0,0\n,5\n");
        let report = session.derive_profit_margin().unwrap();
        assert_eq!(report.undefined, 2);
        assert_eq!(report.infinite, 1);

        let margin = session.dataset().unwrap().column(PROFIT_MARGIN).unwrap();
        assert_eq!(
            margin.as_numeric().to_vec(),
            vec![Some(25.0), Some(f64::INFINITY), None, None]
        );
    }

    #[test]
    fn derive_twice_overwrites_the_column() {
        let (mut session, _file) = loaded("Sales,Profit\n100,20\n");
        session.derive_profit_margin().unwrap();
        session.derive_profit_margin().unwrap();
        assert_eq!(session.dataset().unwrap().width(), 3);
    }

    #[test]
    fn clean_fills_numeric_means_and_is_idempotent() {
        let (mut session, _file) = loaded("Region,Sales,Profit\nA,10,\n,,4\nB,30,8\n");
        let first = session.clean().unwrap();
        assert_eq!(
            first.before,
            vec![
                ("Region".to_string(), 1),
                ("Sales".to_string(), 1),
                ("Profit".to_string(), 1)
            ]
        );
        assert_eq!(
            first.after,
            vec![
                ("Region".to_string(), 1),
                ("Sales".to_string(), 0),
                ("Profit".to_string(), 0)
            ]
        );
        let ds = session.dataset().unwrap();
        assert_eq!(
            ds.column("Sales").unwrap().as_numeric().to_vec(),
            vec![Some(10.0), Some(20.0), Some(30.0)]
        );
        assert_eq!(
            ds.column("Profit").unwrap().as_numeric().to_vec(),
            vec![Some(6.0), Some(4.0), Some(8.0)]
        );

        let snapshot = session.dataset().cloned();
        let second = session.clean().unwrap();
        assert_eq!(second.after, first.after);
        assert!(second.filled.is_empty());
        assert_eq!(session.dataset().cloned(), snapshot);
    }

    #[test]
    fn aggregate_degrades_per_group() {
        let (session, _file) = loaded("Region,Sales\nA,1\nA,2\n");
        let report = session.aggregate().unwrap();
        let sales = report.sales_by_region.groups.unwrap();
        assert_eq!(sales[&CellValue::from("A")], 3.0);
        assert!(report.profit_by_product.groups.is_none());
        assert_eq!(report.var.len(), 1);
    }

    #[test]
    fn line_without_date_keeps_current_chart() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\nB,2\n");
        session.visualize(ChartKind::Bar).unwrap();

        let err = session.visualize(ChartKind::Line).unwrap_err();
        match err {
            SessionError::MissingColumns { columns } => assert_eq!(columns, vec!["Date"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(session.chart().unwrap().kind(), ChartKind::Bar);
        assert_eq!(session.state(), SessionState::Plotted);
    }

    #[test]
    fn failed_visualize_from_loaded_stays_loaded() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\n");
        assert!(session.visualize(ChartKind::Scatter).is_err());
        assert_eq!(session.state(), SessionState::Loaded);
        assert!(matches!(
            session.save("out.png"),
            Err(SessionError::NoChartAvailable)
        ));
    }

    #[test]
    fn heatmap_without_numeric_columns_has_its_own_error() {
        let (mut session, _file) = loaded("Region,Product\nA,X\nB,Y\n");
        let err = session.visualize(ChartKind::Heatmap).unwrap_err();
        assert!(matches!(err, SessionError::NoNumericColumns));
        assert_eq!(err.to_string(), "No numeric columns available to plot.");
        assert_eq!(session.state(), SessionState::Loaded);
    }

    #[test]
    fn save_without_extension_writes_png() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\nB,2\n");
        session.visualize(ChartKind::Bar).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let written = session.save(dir.path().join("chart")).unwrap();
        assert_eq!(written, dir.path().join("chart.png"));
        assert!(written.exists());
    }

    #[test]
    fn save_keeps_the_chart() {
        let (mut session, _file) = loaded("Region,Sales\nA,1\nB,2\n");
        session.visualize(ChartKind::Histogram).unwrap();
        let dir = tempfile::tempdir().unwrap();
        session.save(dir.path().join("a.svg")).unwrap();
        session.save(dir.path().join("b.png")).unwrap();
        assert!(dir.path().join("a.svg").exists());
        assert!(dir.path().join("b.png").exists());
        assert_eq!(session.state(), SessionState::Plotted);

        let err = session.save(dir.path().join("c.unknown")).unwrap_err();
        assert!(matches!(err, SessionError::Export { .. }));
        assert_eq!(session.state(), SessionState::Plotted);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let (mut session, file) = loaded("Region,Sales\nA,1\n");
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.dataset().is_none());
        assert!(matches!(session.load(file.path()), Err(SessionError::Closed)));
        assert!(matches!(session.explore(), Err(SessionError::Closed)));
    }
}
