//! Menu-driven analysis of tabular sales data: load, explore, derive,
//! clean, aggregate, chart and export.

pub mod app;
pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod session;
pub mod ui;

pub use chart::{ChartHandle, ChartKind};
pub use config::Config;
pub use data::model::{CellValue, Column, Dataset};
pub use error::{SessionError, SessionResult};
pub use session::{Session, SessionState, PROFIT_MARGIN};
