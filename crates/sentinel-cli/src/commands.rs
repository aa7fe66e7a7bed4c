//! Command implementations.
//!
//! Every invocation loads the ledger from its state file, runs one
//! operation and, for mutations, writes the new state back. The whole cycle
//! runs under the store's file lock, so concurrent invocations against one
//! state file apply one after another.

use std::io::Write;
use std::path::Path;

use sentinel_ledger::{LedgerConfig, ReportSubmission, ReputationLedger, SnapshotStore};
use tracing::debug;

use crate::cli::{Commands, InitArgs, ReportArgs, ValidatorCommands};
use crate::error::CliError;
use crate::output::{
    FeeSchedule, HighRiskStatus, Message, OutputFormat, ReportReceipt, ScoreInfo, ValidatorList,
    Withdrawal,
};

/// Runs commands against a ledger state file.
#[derive(Debug, Clone)]
pub struct LedgerCommand {
    store: SnapshotStore,
}

impl LedgerCommand {
    /// Command runner for the state file at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            store: SnapshotStore::new(path.as_ref()),
        }
    }

    /// Execute a command.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is missing, unreadable or cannot
    /// be locked, the ledger rejects the operation, or output fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &Commands,
    ) -> Result<(), CliError> {
        self.store.locked(|_| self.execute_locked(writer, format, command))
    }

    fn execute_locked<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &Commands,
    ) -> Result<(), CliError> {
        if let Commands::Init(args) = command {
            return self.init(writer, format, args);
        }

        let ledger = self.load()?;
        match command {
            Commands::Init(_) => {}
            Commands::Report(args) => {
                let receipt = Self::report(&ledger, args)?;
                self.save(&ledger)?;
                format.write(writer, &receipt)?;
            }
            Commands::Validate {
                id,
                validator,
                verdict,
            } => {
                let outcome = ledger.validate_report(*validator, *id, verdict.is_valid())?;
                self.save(&ledger)?;
                format.write(writer, &outcome)?;
            }
            Commands::Analyze { target } => {
                format.write(writer, &ledger.risk_analysis(target))?;
            }
            Commands::HighRisk { target } => {
                let (high_risk, risk_score) = ledger.is_high_risk(target);
                let status = HighRiskStatus {
                    target: *target,
                    high_risk,
                    risk_score,
                };
                format.write(writer, &status)?;
            }
            Commands::Metrics => {
                format.write(writer, &ledger.security_metrics())?;
            }
            Commands::ShowReport { id } => {
                let report = ledger
                    .report(id)
                    .ok_or(sentinel_ledger::LedgerError::ReportNotFound { id: *id })?;
                format.write(writer, &report)?;
            }
            Commands::Score { identity } => {
                let info = ScoreInfo {
                    identity: *identity,
                    score: ledger.reporter_score(identity).value(),
                    is_validator: ledger.is_validator(identity),
                };
                format.write(writer, &info)?;
            }
            Commands::Fees => {
                let fees = FeeSchedule {
                    report_fee: ledger.report_fee(),
                    validation_reward: ledger.validation_reward(),
                    balance: ledger.balance(),
                };
                format.write(writer, &fees)?;
            }
            Commands::Validator { command } => {
                self.validator(writer, format, &ledger, command)?;
            }
            Commands::SetFees {
                caller,
                report_fee,
                validation_reward,
            } => {
                ledger.update_fees(*caller, *report_fee, *validation_reward)?;
                self.save(&ledger)?;
                let msg = Message::success(format!(
                    "Fees updated: report {report_fee}, validation reward {validation_reward}"
                ));
                format.write(writer, &msg)?;
            }
            Commands::Withdraw { caller } => {
                let amount = ledger.emergency_withdraw(*caller)?;
                self.save(&ledger)?;
                let withdrawal = Withdrawal {
                    owner: *caller,
                    amount,
                };
                format.write(writer, &withdrawal)?;
            }
        }
        Ok(())
    }

    fn init<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        args: &InitArgs,
    ) -> Result<(), CliError> {
        if self.store.exists() && !args.force {
            return Err(CliError::AlreadyInitialized(self.store.path().to_path_buf()));
        }

        let config = match (&args.config, args.owner) {
            (Some(path), _) => LedgerConfig::from_file(path)?,
            (None, Some(owner)) => LedgerConfig::new(owner),
            (None, None) => {
                return Err(sentinel_ledger::LedgerError::Config(
                    "either --owner or --config is required".to_string(),
                )
                .into());
            }
        };
        let owner = config.owner;
        let ledger = ReputationLedger::new(config)?;
        self.save(&ledger)?;

        let msg = Message::success(format!(
            "Ledger created at {} (owner {owner})",
            self.store.path().display()
        ));
        format.write(writer, &msg)?;
        Ok(())
    }

    fn report(ledger: &ReputationLedger, args: &ReportArgs) -> Result<ReportReceipt, CliError> {
        let paid = args.paid.unwrap_or_else(|| ledger.report_fee());
        let submission =
            ReportSubmission::new(args.target, args.threat, args.score, args.evidence.clone());
        let report_id = ledger.report_threat(args.reporter, submission, paid)?;
        Ok(ReportReceipt {
            report_id,
            target: args.target,
            threat_type: args.threat,
            risk_score: args.score,
            paid,
        })
    }

    fn validator<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        ledger: &ReputationLedger,
        command: &ValidatorCommands,
    ) -> Result<(), CliError> {
        match command {
            ValidatorCommands::Add { identity, caller } => {
                ledger.add_validator(*caller, *identity)?;
                self.save(ledger)?;
                format.write(writer, &Message::success(format!("Validator {identity} added")))?;
            }
            ValidatorCommands::Remove { identity, caller } => {
                ledger.remove_validator(*caller, *identity)?;
                self.save(ledger)?;
                format.write(writer, &Message::success(format!("Validator {identity} removed")))?;
            }
            ValidatorCommands::List => {
                let list = ValidatorList {
                    owner: ledger.owner(),
                    validators: ledger.validators(),
                };
                format.write(writer, &list)?;
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<ReputationLedger, CliError> {
        if !self.store.exists() {
            return Err(CliError::NotInitialized(self.store.path().to_path_buf()));
        }
        let snapshot = self.store.load()?;
        debug!(path = %self.store.path().display(), "ledger state loaded");
        Ok(ReputationLedger::restore(snapshot)?)
    }

    fn save(&self, ledger: &ReputationLedger) -> Result<(), CliError> {
        self.store.save(&ledger.snapshot())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Format};
    use clap::Parser;

    const OWNER: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const TARGET: &str = "0x7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e7e";
    const REPORTER: &str = "0x0101010101010101010101010101010101010101";

    fn run(state: &Path, args: &[&str]) -> Result<String, CliError> {
        let mut argv = vec!["sentinel", "--format", "json"];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);
        assert_eq!(cli.format, Format::Json);
        let mut out = Vec::new();
        LedgerCommand::new(state).execute(&mut out, &OutputFormat::new(cli.format), &cli.command)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn report(state: &Path, score: &str) -> String {
        let out = run(
            state,
            &["report", TARGET, "--reporter", REPORTER, "--threat", "honeypot", "--score", score, "-e", "proof"],
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        value["report_id"].as_str().unwrap().to_string()
    }

    #[test]
    fn commands_require_init() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        let err = run(&state, &["metrics"]).unwrap_err();
        assert!(matches!(err, CliError::NotInitialized(_)));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        run(&state, &["init", "--owner", OWNER]).unwrap();
        assert!(matches!(
            run(&state, &["init", "--owner", OWNER]),
            Err(CliError::AlreadyInitialized(_))
        ));
        run(&state, &["init", "--owner", OWNER, "--force"]).unwrap();
    }

    #[test]
    fn init_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        let config = dir.path().join("ledger.toml");
        std::fs::write(&config, format!("owner = \"{OWNER}\"\nreport_fee = \"0.5\"\n")).unwrap();
        run(&state, &["init", "--config", config.to_str().unwrap()]).unwrap();

        let out = run(&state, &["fees"]).unwrap();
        assert!(out.contains(r#""report_fee": "0.5""#));
    }

    #[test]
    fn report_then_validate_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        run(&state, &["init", "--owner", OWNER]).unwrap();
        let id = report(&state, "85");

        let out = run(&state, &["validate", &id, "--validator", OWNER, "--verdict", "invalid"]).unwrap();
        assert!(out.contains(r#""is_valid": false"#));

        let metrics = run(&state, &["metrics"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&metrics).unwrap();
        assert_eq!(value["false_positives"], 1);
        assert_eq!(value["flagged_contracts"], 1);

        let err = run(&state, &["validate", &id, "--validator", OWNER, "--verdict", "valid"]).unwrap_err();
        assert!(matches!(
            err,
            CliError::Ledger(sentinel_ledger::LedgerError::AlreadyValidated { .. })
        ));
    }

    #[test]
    fn rejected_mutation_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        run(&state, &["init", "--owner", OWNER]).unwrap();
        let before = std::fs::read(&state).unwrap();

        assert!(run(&state, &["withdraw", "--caller", REPORTER]).is_err());
        assert_eq!(std::fs::read(&state).unwrap(), before);
    }

    #[test]
    fn concurrent_reports_are_all_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        run(&state, &["init", "--owner", OWNER]).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    let args = [
                        "report", TARGET, "--reporter", REPORTER, "--threat", "rugpull", "--score", "30",
                        "-e", "drained",
                    ];
                    (0..10).filter(|_| run(&state, &args).is_ok()).count()
                })
            })
            .collect();
        let acknowledged: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(acknowledged, 80);

        let snapshot = SnapshotStore::new(&state).load().unwrap();
        assert_eq!(snapshot.reports.len(), 80);
        let metrics = run(&state, &["metrics"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&metrics).unwrap();
        assert_eq!(value["total_contracts"], 1);
    }

    #[test]
    fn validator_management() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("ledger.json");
        run(&state, &["init", "--owner", OWNER]).unwrap();
        run(&state, &["validator", "add", REPORTER, "--caller", OWNER]).unwrap();

        let out = run(&state, &["validator", "list"]).unwrap();
        assert!(out.contains(REPORTER));
        let score = run(&state, &["score", REPORTER]).unwrap();
        assert!(score.contains(r#""score": 100"#));

        run(&state, &["validator", "remove", REPORTER, "--caller", OWNER]).unwrap();
        let out = run(&state, &["validator", "list"]).unwrap();
        assert!(!out.contains(REPORTER));
    }
}
