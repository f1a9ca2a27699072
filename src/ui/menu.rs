use std::fmt::Write as _;

use crate::chart::ChartKind;
use crate::error::{SessionError, SessionResult};

// ---------------------------------------------------------------------------
// Main menu
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Load,
    Explore,
    Operations,
    Clean,
    Stats,
    Visualize,
    Save,
    Exit,
}

impl MenuChoice {
    /// Menu order; entry `i` is selected by typing `i + 1`.
    pub const ALL: [MenuChoice; 8] = [
        MenuChoice::Load,
        MenuChoice::Explore,
        MenuChoice::Operations,
        MenuChoice::Clean,
        MenuChoice::Stats,
        MenuChoice::Visualize,
        MenuChoice::Save,
        MenuChoice::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::Load => "Load Dataset",
            MenuChoice::Explore => "Explore Data",
            MenuChoice::Operations => "Perform DataFrame Operations (Mathematical)",
            MenuChoice::Clean => "Handle Missing Data",
            MenuChoice::Stats => "Generate Descriptive Statistics",
            MenuChoice::Visualize => "Data Visualization",
            MenuChoice::Save => "Save Visualization",
            MenuChoice::Exit => "Exit",
        }
    }

    pub fn parse(input: &str) -> SessionResult<Self> {
        select(&Self::ALL, input)
    }
}

/// Parse a chart sub-menu selection.
pub fn parse_chart_kind(input: &str) -> SessionResult<ChartKind> {
    select(&ChartKind::ALL, input)
}

fn select<T: Copy>(options: &[T], input: &str) -> SessionResult<T> {
    let trimmed = input.trim();
    trimmed
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i).copied())
        .ok_or_else(|| SessionError::InvalidSelection {
            input: trimmed.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn main_menu() -> String {
    let mut out = String::from("\n========= MAIN MENU =========\n");
    for (i, choice) in MenuChoice::ALL.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, choice.label());
    }
    out
}

pub fn chart_menu() -> String {
    let mut out = String::from("\nSelect Visualization Type:\n");
    for (i, kind) in ChartKind::ALL.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, kind.label());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_choices() {
        assert_eq!(MenuChoice::parse("1").unwrap(), MenuChoice::Load);
        assert_eq!(MenuChoice::parse(" 8 \n").unwrap(), MenuChoice::Exit);
        assert_eq!(parse_chart_kind("4").unwrap(), ChartKind::Pie);
        assert_eq!(parse_chart_kind("6").unwrap(), ChartKind::Heatmap);
    }

    #[test]
    fn rejects_everything_else() {
        for input in ["0", "9", "", "load", "-1", "1.5"] {
            match MenuChoice::parse(input) {
                Err(SessionError::InvalidSelection { input: got }) => {
                    assert_eq!(got, input.trim())
                }
                other => panic!("{input:?} gave {other:?}"),
            }
        }
        assert!(parse_chart_kind("7").is_err());
    }

    #[test]
    fn menus_list_every_option() {
        let menu = main_menu();
        assert!(menu.contains("1. Load Dataset"));
        assert!(menu.contains("8. Exit"));
        assert!(chart_menu().contains("5. Histogram"));
    }
}
