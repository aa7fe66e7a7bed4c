//! # sentinel-cli
//!
//! Command-line interface to a [`sentinel_ledger::ReputationLedger`] kept in
//! a local JSON state file.
//!
//! Provides commands for:
//! - Filing and validating threat reports
//! - Querying contract risk and security metrics
//! - Owner administration (validators, fees, withdrawal)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, ValidatorCommands};
pub use commands::LedgerCommand;
pub use error::CliError;
pub use output::OutputFormat;
