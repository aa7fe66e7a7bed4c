//! Sentinel CLI binary entrypoint.
//!
//! This is the main entry point for the `sentinel` command-line tool.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sentinel_cli::cli::Cli;
use sentinel_cli::commands::LedgerCommand;
use sentinel_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    LedgerCommand::new(&cli.state)
        .execute(&mut stdout, &format, &cli.command)
        .with_context(|| format!("ledger {}", cli.state.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_cli::cli::{Commands, Format};

    #[test]
    fn cli_parses_metrics() {
        let cli = Cli::parse_from(["sentinel", "metrics"]);
        assert!(matches!(cli.command, Commands::Metrics));
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["sentinel", "--format", "json", "fees"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn run_without_state_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cli = Cli::parse_from(["sentinel", "--state", path.to_str().unwrap(), "metrics"]);
        let err = run(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("sentinel init"));
    }
}
