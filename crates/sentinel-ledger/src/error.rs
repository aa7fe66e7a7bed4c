//! Error types for ledger operations.

use std::fmt;

use thiserror::Error;

use crate::address::Address;
use crate::amount::Amount;
use crate::report::ReportId;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Broad classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input (score out of range, empty evidence, zero target, bad text).
    Validation,
    /// Caller lacks validator or owner privilege.
    Authorization,
    /// Not enough value attached to the call.
    Economic,
    /// Operation conflicts with current ledger state.
    StateConflict,
    /// A counter or balance would overflow.
    Arithmetic,
    /// Invalid configuration.
    Config,
    /// Snapshot I/O or encoding failure.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::Economic => "economic",
            Self::StateConflict => "state-conflict",
            Self::Arithmetic => "arithmetic",
            Self::Config => "config",
            Self::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during ledger operations.
///
/// Every rejection leaves the ledger untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Risk score above the maximum of 100.
    #[error("risk score {score} out of range (max {max})")]
    InvalidRiskScore {
        /// The rejected score.
        score: u8,
        /// Largest accepted score.
        max: u8,
    },

    /// Evidence was empty or whitespace.
    #[error("evidence must not be empty")]
    EmptyEvidence,

    /// Target contract is the zero address.
    #[error("invalid target contract: {target}")]
    InvalidTarget {
        /// The rejected target.
        target: Address,
    },

    /// Address text could not be parsed.
    #[error("invalid address: {message}")]
    InvalidAddress {
        /// Description of the address error.
        message: String,
    },

    /// Amount text could not be parsed.
    #[error("invalid amount: {message}")]
    InvalidAmount {
        /// Description of the amount error.
        message: String,
    },

    /// Threat type name or ordinal is unknown.
    #[error("unknown threat type: {value}")]
    UnknownThreatType {
        /// The rejected input.
        value: String,
    },

    /// Report id text could not be parsed.
    #[error("invalid report id: {message}")]
    InvalidReportId {
        /// Description of the id error.
        message: String,
    },

    /// Caller is not in the validator set.
    #[error("{caller} is not a validator")]
    NotValidator {
        /// The rejected caller.
        caller: Address,
    },

    /// Caller is not the ledger owner.
    #[error("{caller} is not the ledger owner")]
    NotOwner {
        /// The rejected caller.
        caller: Address,
    },

    /// Attached value is below the report fee.
    #[error("insufficient fee: required {required}, paid {paid}")]
    InsufficientFee {
        /// Current report fee.
        required: Amount,
        /// Amount attached by the caller.
        paid: Amount,
    },

    /// No report with this id.
    #[error("report not found: {id}")]
    ReportNotFound {
        /// The unknown id.
        id: ReportId,
    },

    /// Report was validated before.
    #[error("report already validated: {id}")]
    AlreadyValidated {
        /// The report id.
        id: ReportId,
    },

    /// Identity is already a validator.
    #[error("{identity} is already a validator")]
    ValidatorExists {
        /// The identity.
        identity: Address,
    },

    /// Identity is not a validator.
    #[error("{identity} is not in the validator set")]
    ValidatorMissing {
        /// The identity.
        identity: Address,
    },

    /// Arithmetic overflow.
    #[error("arithmetic overflow: {what}")]
    Overflow {
        /// What overflowed.
        what: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot failed consistency checks.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Create an invalid address error.
    #[must_use]
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    /// Create an invalid amount error.
    #[must_use]
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    /// Create an invalid report id error.
    #[must_use]
    pub fn invalid_report_id(message: impl Into<String>) -> Self {
        Self::InvalidReportId {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRiskScore { .. }
            | Self::EmptyEvidence
            | Self::InvalidTarget { .. }
            | Self::InvalidAddress { .. }
            | Self::InvalidAmount { .. }
            | Self::UnknownThreatType { .. }
            | Self::InvalidReportId { .. } => ErrorKind::Validation,
            Self::NotValidator { .. } | Self::NotOwner { .. } => ErrorKind::Authorization,
            Self::InsufficientFee { .. } => ErrorKind::Economic,
            Self::ReportNotFound { .. }
            | Self::AlreadyValidated { .. }
            | Self::ValidatorExists { .. }
            | Self::ValidatorMissing { .. } => ErrorKind::StateConflict,
            Self::Overflow { .. } => ErrorKind::Arithmetic,
            Self::Config(_) => ErrorKind::Config,
            Self::CorruptSnapshot(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }
}
