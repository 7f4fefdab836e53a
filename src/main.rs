mod cli;
mod config;
mod error;
mod extract;
mod inference;
mod output;
mod periods;
mod privacy;
mod query;
mod report;
mod stats;
mod types;

use std::io::Write;

use clap::Parser;
use cli::{Cli, Commands};
use config::{ReportConfig, DATABASE_ENV};
use error::Error;
use query::SqliteExecutor;
use report::Section;
use tracing::info;
use types::Result;

/// Initialize the tracing subscriber. Logs go to stderr so stdout only
/// carries report output.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet);

    let database = cli.database.as_deref().ok_or_else(|| {
        Error::Config(format!(
            "no database given; pass --database or set {}",
            DATABASE_ENV
        ))
    })?;
    let mut executor = SqliteExecutor::new(database);
    info!(db = %executor.fingerprint(), "Using database");

    let sections = match &cli.command {
        Commands::Report { config } => {
            let config = ReportConfig::load(config)?;
            report::run_report(&mut executor, &config)?
        }
        command => {
            let step = command.to_step().ok_or_else(|| {
                Error::InvalidArgument("command has no report step".to_string())
            })?;
            report::run_step(&mut executor, &step, &cli.disclosure.options())?
        }
    };

    match &cli.out {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let mut writer = std::io::BufWriter::new(file);
            write_sections(&mut writer, &cli, &sections)?;
            writer.flush()?;
            info!(path = %path.display(), "Report written");
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write_sections(&mut handle, &cli, &sections)?;
        }
    }

    Ok(())
}

fn write_sections<W: Write>(writer: &mut W, cli: &Cli, sections: &[Section]) -> Result<()> {
    for section in sections {
        output::render(writer, cli.format, &section.title, &section.table)?;
    }
    Ok(())
}
