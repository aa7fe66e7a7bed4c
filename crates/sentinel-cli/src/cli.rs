//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sentinel_ledger::{Address, Amount, ReportId, ThreatType};

/// Sentinel - community threat reports for smart contracts.
#[derive(Parser, Debug, Clone)]
#[command(name = "sentinel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Ledger state file.
    #[arg(short, long, env = "SENTINEL_STATE", default_value = "sentinel-ledger.json")]
    pub state: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a new ledger state file.
    Init(InitArgs),

    /// File a threat report against a contract.
    Report(ReportArgs),

    /// Record a verdict on a report.
    Validate {
        /// Report to decide on.
        id: ReportId,

        /// Deciding validator.
        #[arg(long)]
        validator: Address,

        /// Verdict.
        #[arg(long, value_enum)]
        verdict: VerdictArg,
    },

    /// Show the risk analysis of a contract.
    Analyze {
        /// Target contract.
        target: Address,
    },

    /// Check whether a contract is high risk.
    HighRisk {
        /// Target contract.
        target: Address,
    },

    /// Show ledger-wide security metrics.
    Metrics,

    /// Show one report.
    ShowReport {
        /// Report id.
        id: ReportId,
    },

    /// Show an identity's reporter score.
    Score {
        /// Identity to look up.
        identity: Address,
    },

    /// Show the current fees and balance.
    Fees,

    /// Validator set management.
    Validator {
        /// Validator subcommand to execute.
        #[command(subcommand)]
        command: ValidatorCommands,
    },

    /// Change the report fee and validation reward (owner only).
    SetFees {
        /// Calling identity.
        #[arg(long)]
        caller: Address,

        /// New report fee.
        #[arg(long)]
        report_fee: Amount,

        /// New validation reward.
        #[arg(long)]
        validation_reward: Amount,
    },

    /// Move the entire balance to the owner (owner only).
    Withdraw {
        /// Calling identity.
        #[arg(long)]
        caller: Address,
    },
}

/// Arguments for the init command.
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Owner identity. Required unless `--config` is given.
    #[arg(long, required_unless_present = "config")]
    pub owner: Option<Address>,

    /// TOML ledger configuration.
    #[arg(short, long, conflicts_with = "owner")]
    pub config: Option<PathBuf>,

    /// Overwrite an existing state file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the report command.
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Reported contract.
    pub target: Address,

    /// Filing identity.
    #[arg(long)]
    pub reporter: Address,

    /// Threat type, by name or ordinal.
    #[arg(short, long)]
    pub threat: ThreatType,

    /// Risk score, 0-100.
    #[arg(long)]
    pub score: u8,

    /// Evidence text or reference.
    #[arg(short, long)]
    pub evidence: String,

    /// Amount attached. Defaults to the current report fee.
    #[arg(long)]
    pub paid: Option<Amount>,
}

/// Verdict choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerdictArg {
    /// The report is correct.
    Valid,
    /// The report is a false positive.
    Invalid,
}

impl VerdictArg {
    /// As a boolean verdict.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validator subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ValidatorCommands {
    /// Add a validator (owner only).
    Add {
        /// Identity to add.
        identity: Address,

        /// Calling identity.
        #[arg(long)]
        caller: Address,
    },

    /// Remove a validator (owner only).
    Remove {
        /// Identity to remove.
        identity: Address,

        /// Calling identity.
        #[arg(long)]
        caller: Address,
    },

    /// List validators.
    List,
}
