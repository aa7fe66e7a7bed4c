//! Network-wide security metrics and per-target risk views.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::reputation::ContractReputation;
use crate::threat::{is_high_risk_score, RiskLevel, ThreatType};

/// Ledger-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityMetrics {
    /// Distinct targets ever reported.
    pub total_contracts: u64,
    /// Targets whose average has ever crossed the high-risk threshold.
    pub flagged_contracts: u64,
    /// Reports confirmed valid.
    pub validated_reports: u64,
    /// Reports confirmed invalid.
    pub false_positives: u64,
}

impl SecurityMetrics {
    /// Reports that have received a verdict either way.
    #[must_use]
    pub const fn decided_reports(&self) -> u64 {
        self.validated_reports.saturating_add(self.false_positives)
    }
}

/// Read-only risk summary for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    /// The target analysed.
    pub target: Address,
    /// Risk band of the average score.
    pub risk_level: RiskLevel,
    /// Average score, 0 without reports.
    pub risk_score: u8,
    /// Number of reports.
    pub report_count: u64,
    /// Reported threat types in ordinal order.
    pub threat_types: Vec<ThreatType>,
}

impl RiskAnalysis {
    /// Analysis of a target nobody has reported.
    #[must_use]
    pub fn unreported(target: Address) -> Self {
        Self {
            target,
            risk_level: RiskLevel::Safe,
            risk_score: 0,
            report_count: 0,
            threat_types: Vec::new(),
        }
    }

    /// Build from a stored aggregate.
    #[must_use]
    pub fn from_reputation(reputation: &ContractReputation) -> Self {
        let risk_score = reputation.average_score();
        Self {
            target: reputation.target,
            risk_level: RiskLevel::from_score(risk_score),
            risk_score,
            report_count: reputation.report_count,
            threat_types: reputation.threat_types(),
        }
    }

    /// True when the target is classified [`RiskLevel::Dangerous`].
    #[must_use]
    pub const fn is_high_risk(&self) -> bool {
        is_high_risk_score(self.risk_score)
    }
}
