//! Threat reports and their validation lifecycle.
//!
//! A report moves through a one-shot state machine:
//!
//! ```text
//! Submitted ──validate(valid)───▶ ConfirmedValid
//!     │
//!     └──────validate(invalid)──▶ ConfirmedInvalid
//! ```
//!
//! Both confirmed states are terminal.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::threat::ThreatType;

/// Unique report identifier (32-byte digest).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportId([u8; 32]);

impl ReportId {
    /// Derive the id for a new report.
    ///
    /// `nonce` is the ledger's submission counter; it keeps ids distinct for
    /// identical reports filed within the same second.
    #[must_use]
    pub fn derive(
        reporter: &Address,
        target: &Address,
        threat_type: ThreatType,
        submitted_at: DateTime<Utc>,
        nonce: u64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(reporter.as_bytes());
        hasher.update(target.as_bytes());
        hasher.update(&[threat_type.ordinal()]);
        hasher.update(&submitted_at.timestamp().to_be_bytes());
        hasher.update(&nonce.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create an id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReportId({})", self.to_hex())
    }
}

impl FromStr for ReportId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| LedgerError::invalid_report_id(format!("invalid hex: {e}")))?;
        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            LedgerError::invalid_report_id(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }
}

impl Serialize for ReportId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Lifecycle state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Filed, awaiting a validator.
    Submitted,
    /// A validator confirmed the threat.
    ConfirmedValid,
    /// A validator rejected the report as a false positive.
    ConfirmedInvalid,
}

impl ReportStatus {
    /// Check if the report can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ConfirmedValid | Self::ConfirmedInvalid)
    }

    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Submitted, Self::ConfirmedValid | Self::ConfirmedInvalid)
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::ConfirmedValid => write!(f, "confirmed-valid"),
            Self::ConfirmedInvalid => write!(f, "confirmed-invalid"),
        }
    }
}

/// A validator's decision on a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Validator who decided.
    pub validator: Address,
    /// Whether the threat was confirmed.
    pub valid: bool,
    /// When the decision was recorded.
    pub decided_at: DateTime<Utc>,
}

/// A threat report filed against a target contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatReport {
    /// Unique report id.
    pub id: ReportId,
    /// Identity that filed the report.
    pub reporter: Address,
    /// Contract the report is about.
    pub target: Address,
    /// Alleged threat.
    pub threat_type: ThreatType,
    /// Reporter's risk score, 0..=100.
    pub risk_score: u8,
    /// Free-form evidence or a reference to it.
    pub evidence: String,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Set once a validator has decided.
    pub validated: bool,
    /// Number of validations recorded.
    pub validation_count: u32,
    /// Validator decision, if any.
    pub verdict: Option<Verdict>,
}

impl ThreatReport {
    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ReportStatus {
        match &self.verdict {
            None => ReportStatus::Submitted,
            Some(v) if v.valid => ReportStatus::ConfirmedValid,
            Some(_) => ReportStatus::ConfirmedInvalid,
        }
    }

    /// Record a validator decision.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyValidated`] if a decision exists.
    pub fn record_verdict(
        &mut self,
        validator: Address,
        valid: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<()> {
        let target = if valid {
            ReportStatus::ConfirmedValid
        } else {
            ReportStatus::ConfirmedInvalid
        };
        if self.validated || !self.status().can_transition_to(&target) {
            return Err(LedgerError::AlreadyValidated { id: self.id });
        }
        self.validated = true;
        self.validation_count = self.validation_count.saturating_add(1);
        self.verdict = Some(Verdict {
            validator,
            valid,
            decided_at,
        });
        Ok(())
    }
}
