//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use sentinel_ledger::{
    Address, Amount, ReportId, RiskAnalysis, SecurityMetrics, ThreatReport, ThreatType,
    ValidationOutcome,
};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for RiskAnalysis {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Risk Analysis")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Target:        {}", self.target)?;
        writeln!(writer, "Risk Level:    {}", self.risk_level)?;
        writeln!(writer, "Risk Score:    {}", self.risk_score)?;
        writeln!(writer, "Reports:       {}", self.report_count)?;
        writeln!(writer, "Threat Types:  {}", join_threats(&self.threat_types))?;
        Ok(())
    }
}

impl TableDisplay for SecurityMetrics {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Security Metrics")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Contracts")?;
        writeln!(writer, "  Reported:        {}", self.total_contracts)?;
        writeln!(writer, "  Flagged:         {}", self.flagged_contracts)?;
        writeln!(writer)?;
        writeln!(writer, "Verdicts")?;
        writeln!(writer, "  Valid:           {}", self.validated_reports)?;
        writeln!(writer, "  False positives: {}", self.false_positives)?;
        Ok(())
    }
}

impl TableDisplay for ThreatReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Report {}", self.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Reporter:      {}", self.reporter)?;
        writeln!(writer, "Target:        {}", self.target)?;
        writeln!(writer, "Threat:        {}", self.threat_type)?;
        writeln!(writer, "Risk Score:    {}", self.risk_score)?;
        writeln!(writer, "Submitted:     {}", self.submitted_at.to_rfc3339())?;
        writeln!(writer, "Status:        {:?}", self.status())?;
        if let Some(verdict) = &self.verdict {
            writeln!(writer, "Validator:     {}", verdict.validator)?;
            writeln!(writer, "Decided:       {}", verdict.decided_at.to_rfc3339())?;
        }
        writeln!(writer)?;
        writeln!(writer, "Evidence")?;
        writeln!(writer, "  {}", self.evidence)?;
        Ok(())
    }
}

impl TableDisplay for ValidationOutcome {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let verdict = if self.is_valid { "valid" } else { "invalid" };
        writeln!(writer, "✓ Report {} marked {verdict}", self.report_id)?;
        writeln!(
            writer,
            "  Reporter {} score: {}",
            self.reporter,
            self.reporter_score.value()
        )?;
        match self.reward_paid {
            Some(amount) => writeln!(writer, "  Reward paid: {amount}")?,
            None => writeln!(writer, "  Reward not paid: balance too low")?,
        }
        Ok(())
    }
}

/// Receipt for a filed report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportReceipt {
    /// New report id.
    pub report_id: ReportId,
    /// Reported contract.
    pub target: Address,
    /// Alleged threat.
    pub threat_type: ThreatType,
    /// Reported score.
    pub risk_score: u8,
    /// Amount attached.
    pub paid: Amount,
}

impl TableDisplay for ReportReceipt {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Report filed: {}", self.report_id)?;
        writeln!(
            writer,
            "  {} {} score {} (paid {})",
            self.target, self.threat_type, self.risk_score, self.paid
        )?;
        Ok(())
    }
}

/// High-risk check result.
#[derive(Debug, Clone, Serialize)]
pub struct HighRiskStatus {
    /// Target contract.
    pub target: Address,
    /// Whether the average exceeds the threshold.
    pub high_risk: bool,
    /// The average.
    pub risk_score: u8,
}

impl TableDisplay for HighRiskStatus {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let label = if self.high_risk { "HIGH RISK" } else { "not high risk" };
        writeln!(writer, "{}: {label} (score {})", self.target, self.risk_score)?;
        Ok(())
    }
}

/// Reporter score lookup.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreInfo {
    /// Identity.
    pub identity: Address,
    /// Score, 0-100.
    pub score: u8,
    /// Whether the identity may validate.
    pub is_validator: bool,
}

impl TableDisplay for ScoreInfo {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Identity:   {}", self.identity)?;
        writeln!(writer, "Score:      {}", self.score)?;
        writeln!(writer, "Validator:  {}", if self.is_validator { "yes" } else { "no" })?;
        Ok(())
    }
}

/// Current fees and balance.
#[derive(Debug, Clone, Serialize)]
pub struct FeeSchedule {
    /// Minimum attached to a report.
    pub report_fee: Amount,
    /// Paid per validation.
    pub validation_reward: Amount,
    /// Retained balance.
    pub balance: Amount,
}

impl TableDisplay for FeeSchedule {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Report Fee:         {}", self.report_fee)?;
        writeln!(writer, "Validation Reward:  {}", self.validation_reward)?;
        writeln!(writer, "Balance:            {}", self.balance)?;
        Ok(())
    }
}

/// Validator set for display.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorList {
    /// Ledger owner.
    pub owner: Address,
    /// Validators, sorted.
    pub validators: Vec<Address>,
}

impl TableDisplay for ValidatorList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.validators.is_empty() {
            writeln!(writer, "No validators")?;
            return Ok(());
        }
        writeln!(writer, "{:<42}  {}", "VALIDATOR", "ROLE")?;
        writeln!(writer, "{}", "─".repeat(52))?;
        for validator in &self.validators {
            let role = if *validator == self.owner { "owner" } else { "" };
            writeln!(writer, "{validator:<42}  {role}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} validator(s)", self.validators.len())?;
        Ok(())
    }
}

/// Emergency withdrawal result.
#[derive(Debug, Clone, Serialize)]
pub struct Withdrawal {
    /// Recipient.
    pub owner: Address,
    /// Amount moved.
    pub amount: Amount,
}

impl TableDisplay for Withdrawal {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Withdrew {} to {}", self.amount, self.owner)?;
        Ok(())
    }
}

/// Simple message for display.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    /// Create an informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}

fn join_threats(threats: &[ThreatType]) -> String {
    if threats.is_empty() {
        return "-".to_string();
    }
    threats
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
