use std::io::{BufRead, Write};

use anyhow::Result;

use crate::error::{SessionError, SessionResult};
use crate::session::{Session, SessionState};
use crate::ui::menu::{self, MenuChoice};

// ---------------------------------------------------------------------------
// Command loop
// ---------------------------------------------------------------------------

/// Reads menu selections from `input`, runs them against the session and
/// writes results to `output`. Only I/O failures on the terminal end the loop
/// early; session errors are printed and the menu is shown again.
pub struct App<R, W> {
    pub session: Session,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> App<R, W> {
    pub fn new(session: Session, input: R, output: W) -> Self {
        App {
            session,
            input,
            output,
        }
    }

    /// Run until the user picks Exit or input ends, then close the session.
    pub fn run(&mut self) -> Result<()> {
        writeln!(self.output, "***** Data Analysis & Visualization Program *****")?;

        loop {
            write!(self.output, "{}", menu::main_menu())?;
            let Some(line) = self.prompt("Enter your choice: ")? else {
                break;
            };
            match MenuChoice::parse(&line) {
                Ok(MenuChoice::Exit) => {
                    writeln!(self.output, "Exiting program. Goodbye!")?;
                    break;
                }
                Ok(choice) => self.dispatch(choice)?,
                Err(err) => writeln!(self.output, "{err} Please try again.")?,
            }
        }

        if self.session.close() {
            writeln!(self.output, "Cleaning up resources...")?;
        }
        Ok(())
    }

    /// Print the outcome of a startup load given on the command line.
    pub fn preload(&mut self, path: &str) -> Result<()> {
        let outcome = self.session.load(path).map(|r| r.to_string());
        self.report(outcome)
    }

    fn dispatch(&mut self, choice: MenuChoice) -> Result<()> {
        log::debug!("menu: {choice:?}");
        let outcome: SessionResult<String> = match choice {
            MenuChoice::Load => {
                let Some(path) = self.prompt("Enter dataset path (CSV file): ")? else {
                    return Ok(());
                };
                self.session.load(path.trim()).map(|r| r.to_string())
            }
            MenuChoice::Explore => self.session.explore().map(|r| r.to_string()),
            MenuChoice::Operations => self.session.derive_profit_margin().map(|r| r.to_string()),
            MenuChoice::Clean => self.session.clean().map(|r| r.to_string()),
            MenuChoice::Stats => self.session.aggregate().map(|r| r.to_string()),
            MenuChoice::Visualize => self.visualize()?,
            MenuChoice::Save => self.save()?,
            MenuChoice::Exit => Ok(String::new()),
        };
        self.report(outcome)
    }

    fn visualize(&mut self) -> Result<SessionResult<String>> {
        // Ask for a chart kind only when a chart could be drawn.
        match self.session.state() {
            SessionState::Empty => return Ok(Err(SessionError::NoDatasetLoaded)),
            SessionState::Closed => return Ok(Err(SessionError::Closed)),
            SessionState::Loaded | SessionState::Plotted => {}
        }
        write!(self.output, "{}", menu::chart_menu())?;
        let Some(line) = self.prompt("Enter your choice: ")? else {
            return Ok(Ok(String::new()));
        };
        Ok(menu::parse_chart_kind(&line)
            .and_then(|kind| self.session.visualize(kind))
            .map(|handle| format!("Displayed {handle}")))
    }

    fn save(&mut self) -> Result<SessionResult<String>> {
        if self.session.chart().is_none() {
            return Ok(Err(SessionError::NoChartAvailable));
        }
        let Some(name) = self.prompt("Enter file name to save the plot (e.g., sales_plot.png): ")?
        else {
            return Ok(Ok(String::new()));
        };
        Ok(self
            .session
            .save(name.trim())
            .map(|path| format!("Visualization saved as {} successfully!", path.display())))
    }

    fn report(&mut self, outcome: SessionResult<String>) -> Result<()> {
        match outcome {
            Ok(text) if text.is_empty() => {}
            Ok(text) => writeln!(self.output, "{text}")?,
            Err(err) => {
                log::warn!("{err}");
                writeln!(self.output, "{err}")?;
            }
        }
        Ok(())
    }

    /// `None` once input is exhausted.
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(script: &str) -> (String, Session) {
        let mut output = Vec::new();
        let mut app = App::new(Session::default(), Cursor::new(script.to_string()), &mut output);
        app.run().unwrap();
        let session = std::mem::take(&mut app.session);
        drop(app);
        (String::from_utf8(output).unwrap(), session)
    }

    #[test]
    fn exit_ends_the_loop() {
        let (out, session) = run("8\n");
        assert!(out.contains("MAIN MENU"));
        assert!(out.contains("Goodbye!"));
        assert!(out.contains("Cleaning up resources..."));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn end_of_input_also_closes() {
        let (out, _) = run("");
        assert!(out.contains("Cleaning up resources..."));
    }

    #[test]
    fn errors_are_printed_and_the_menu_returns() {
        let (out, _) = run("2\n7\n42\n6\n8\n");
        assert!(out.contains("No dataset loaded."));
        assert!(out.contains("No plot available to save."));
        assert!(out.contains("Invalid choice: '42' Please try again."));
        assert!(!out.contains("Select Visualization Type"));
        assert_eq!(out.matches("MAIN MENU").count(), 5);
    }

    #[test]
    fn load_visualize_and_save_through_the_menu() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("sales.csv");
        std::fs::write(&csv, "Region,Sales\nA,100\nB,200\n").unwrap();
        let chart = dir.path().join("chart.svg");

        let script = format!(
            "1\n{}\n6\n9\n6\n4\n7\n{}\n8\n",
            csv.display(),
            chart.display()
        );
        let (out, _) = run(&script);
        assert!(out.contains("Dataset loaded successfully!"));
        assert!(out.contains("Invalid choice: '9'"));
        assert!(out.contains("Displayed Pie Chart"));
        assert!(out.contains("saved as"));
        assert!(chart.exists());
    }
}
