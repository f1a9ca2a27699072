use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use sales_analyzer::app::App;
use sales_analyzer::config::{Config, CONFIG_ENV};
use sales_analyzer::session::Session;

const USAGE: &str = "\
Usage: sales-analyzer [--config <file.json>] [dataset]

  dataset           file to load before the menu starts (.csv .tsv .json .parquet)
  --config <file>   JSON settings; defaults to $SALES_ANALYZER_CONFIG if set
  -h, --help        print this help

Log verbosity is controlled with RUST_LOG (e.g. RUST_LOG=debug).";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    dataset: Option<String>,
    help: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--config" => {
                let path = args.next().context("--config needs a file path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if parsed.dataset.is_some() => bail!("only one dataset path may be given"),
            _ => parsed.dataset = Some(arg),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = Config::resolve(args.config.as_deref())
        .with_context(|| format!("loading configuration (see --config or ${CONFIG_ENV})"))?;
    log::debug!("Using {config:?}");

    let stdin = io::stdin();
    let mut app = App::new(Session::new(&config), stdin.lock(), io::stdout().lock());
    if let Some(path) = args.dataset.as_deref() {
        app.preload(path)?;
    }
    app.run()
}
