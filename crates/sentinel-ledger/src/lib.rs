//! # sentinel-ledger
//!
//! Community threat-report ledger for smart contracts.
//!
//! Reporters pay a small fee to file a [`ThreatReport`] against a target
//! contract. Reports are folded into a per-target [`ContractReputation`],
//! from which a [`RiskAnalysis`] is derived. Validators confirm or refute
//! reports, which moves the reporter's [`ReporterScore`] and earns the
//! validator a reward while the ledger balance covers it.
//!
//! This crate provides:
//!
//! - [`ReputationLedger`]: the shared, lock-protected ledger
//! - [`Address`], [`Amount`], [`ReportId`]: domain primitives
//! - [`EventSink`] and friends: delivery of [`LedgerEvent`]s
//! - [`SnapshotStore`]: JSON persistence of [`LedgerSnapshot`]s
//!
//! ```
//! use sentinel_ledger::{Address, LedgerConfig, ReportSubmission, ReputationLedger, RiskLevel, ThreatType};
//!
//! let owner = Address::from_bytes([0xaa; 20]);
//! let ledger = ReputationLedger::new(LedgerConfig::new(owner))?;
//!
//! let target = Address::from_bytes([0x42; 20]);
//! ledger.report_threat(
//!     Address::from_bytes([1; 20]),
//!     ReportSubmission::new(target, ThreatType::Honeypot, 85, "sell() always reverts"),
//!     ledger.report_fee(),
//! )?;
//!
//! assert_eq!(ledger.risk_analysis(&target).risk_level, RiskLevel::Dangerous);
//! # Ok::<(), sentinel_ledger::LedgerError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod amount;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod report;
pub mod reputation;
pub mod store;
pub mod threat;

pub use address::Address;
pub use amount::Amount;
pub use config::{LedgerConfig, DEFAULT_REPORT_FEE, DEFAULT_VALIDATION_REWARD};
pub use error::{ErrorKind, LedgerError, Result};
pub use events::{
    BroadcastEventSink, EventEnvelope, EventSink, FanoutEventSink, LedgerEvent, NoopEventSink,
    TracingEventSink,
};
pub use ledger::{ReportSubmission, ReputationLedger, ValidationOutcome};
pub use metrics::{RiskAnalysis, SecurityMetrics};
pub use report::{ReportId, ReportStatus, ThreatReport, Verdict};
pub use reputation::{ContractReputation, ReporterScore};
pub use store::{LedgerSnapshot, SnapshotStore};
pub use threat::{RiskLevel, ThreatType, HIGH_RISK_THRESHOLD, MAX_RISK_SCORE, SAFE_CEILING};
