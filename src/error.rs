use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Session error taxonomy
// ---------------------------------------------------------------------------

/// Every way a session operation can fail.
///
/// None of these are fatal: the session is left exactly as it was before the
/// failing call and the command loop carries on.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("File not found: {}. Please check the path and try again.", .path.display())]
    NotFound { path: PathBuf },

    #[error("Could not read {}: {source:#}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("No dataset loaded.")]
    NoDatasetLoaded,

    #[error("Missing required column(s): {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("No numeric columns available to plot.")]
    NoNumericColumns,

    #[error("No plot available to save. Please create a plot first.")]
    NoChartAvailable,

    #[error("Invalid choice: '{input}'")]
    InvalidSelection { input: String },

    #[error("Could not save chart to {}: {source:#}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Session is closed.")]
    Closed,
}

impl SessionError {
    /// Whether this error came from a failed load (either kind).
    pub fn is_load_failure(&self) -> bool {
        matches!(self, SessionError::NotFound { .. } | SessionError::Unreadable { .. })
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
