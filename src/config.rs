use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "SALES_ANALYZER_CONFIG";

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Tunables for reports and charts. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rows shown by the explore preview.
    pub preview_rows: usize,
    /// Number of equal-width bins in the histogram.
    pub histogram_bins: usize,
    pub chart_width: u32,
    pub chart_height: u32,
    pub chart_title: String,
    /// TrueType font used for chart text. When unset a few common system
    /// locations are probed. The font is registered process-wide, so the
    /// most recent export's choice applies.
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            histogram_bins: 10,
            chart_width: 1024,
            chart_height: 768,
            chart_title: "Data Visualization".to_string(),
            font_path: None,
        }
    }
}

impl Config {
    /// Read a config file, falling back to defaults for absent fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Resolve the config from an explicit path, then the environment,
    /// then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn sanitized(mut self) -> Self {
        self.histogram_bins = self.histogram_bins.max(1);
        self.chart_width = self.chart_width.max(64);
        self.chart_height = self.chart_height.max(64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"histogram_bins": 20, "chart_title": "Sales"}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.histogram_bins, 20);
        assert_eq!(config.chart_title, "Sales");
        assert_eq!(config.preview_rows, 5);
        assert_eq!(config.chart_width, 1024);
    }

    #[test]
    fn zero_bins_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"histogram_bins": 0}}"#).unwrap();
        assert_eq!(Config::from_file(file.path()).unwrap().histogram_bins, 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
