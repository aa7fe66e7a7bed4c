//! Per-target reputation aggregates and per-identity reporter scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{LedgerError, Result};
use crate::threat::{is_high_risk_score, RiskLevel, ThreatType};

/// Aggregated reports against one target contract.
///
/// Only exists once at least one report was filed, so `report_count` is
/// always positive for a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReputation {
    /// The target contract.
    pub target: Address,
    /// Sum of every risk score reported against the target.
    pub cumulative_score: u64,
    /// Number of reports.
    pub report_count: u64,
    /// Reports per threat type, indexed by ordinal.
    pub threat_counts: [u64; ThreatType::COUNT],
    /// Time of the last report.
    pub last_updated: DateTime<Utc>,
    /// Set once the target has been counted as flagged. Never cleared.
    pub flagged: bool,
}

/// Result of folding one report into a [`ContractReputation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReputationChange {
    /// Average before the report.
    pub previous_average: u8,
    /// Average after the report.
    pub new_average: u8,
    /// True exactly once per target: the first upward crossing of the
    /// high-risk threshold.
    pub newly_flagged: bool,
}

impl ContractReputation {
    /// Create an empty aggregate for a target.
    #[must_use]
    pub fn new(target: Address, now: DateTime<Utc>) -> Self {
        Self {
            target,
            cumulative_score: 0,
            report_count: 0,
            threat_counts: [0; ThreatType::COUNT],
            last_updated: now,
            flagged: false,
        }
    }

    /// Average risk score, or 0 without reports.
    #[must_use]
    pub fn average_score(&self) -> u8 {
        average(self.cumulative_score, self.report_count)
    }

    /// Risk band of the current average.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.average_score())
    }

    /// Threat types with at least one report, in ordinal order.
    #[must_use]
    pub fn threat_types(&self) -> Vec<ThreatType> {
        ThreatType::ALL
            .into_iter()
            .filter(|t| self.threat_counts[t.index()] > 0)
            .collect()
    }

    /// Reports recorded for one threat type.
    #[must_use]
    pub const fn count_for(&self, threat_type: ThreatType) -> u64 {
        self.threat_counts[threat_type.index()]
    }

    /// Apply a new report.
    ///
    /// The threshold crossing is decided by comparing the averages before and
    /// after the update, and suppressed once the target has been flagged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if a counter would overflow; the
    /// aggregate is left untouched in that case.
    pub fn apply_report(
        &mut self,
        threat_type: ThreatType,
        risk_score: u8,
        now: DateTime<Utc>,
    ) -> Result<ReputationChange> {
        let previous_average = self.average_score();

        let cumulative_score = self
            .cumulative_score
            .checked_add(u64::from(risk_score))
            .ok_or(LedgerError::Overflow { what: "cumulative score" })?;
        let report_count = self
            .report_count
            .checked_add(1)
            .ok_or(LedgerError::Overflow { what: "report count" })?;
        let type_count = self.threat_counts[threat_type.index()]
            .checked_add(1)
            .ok_or(LedgerError::Overflow { what: "threat type count" })?;

        self.cumulative_score = cumulative_score;
        self.report_count = report_count;
        self.threat_counts[threat_type.index()] = type_count;
        self.last_updated = now;

        let new_average = self.average_score();
        let newly_flagged = !self.flagged
            && !is_high_risk_score(previous_average)
            && is_high_risk_score(new_average);
        if newly_flagged {
            self.flagged = true;
        }

        Ok(ReputationChange {
            previous_average,
            new_average,
            newly_flagged,
        })
    }
}

fn average(cumulative: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    // Every score is <= 100, so the quotient is too.
    u8::try_from(cumulative / count).unwrap_or(u8::MAX)
}

/// A reporter's standing, clamped to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ReporterScore(u8);

impl ReporterScore {
    /// Upper bound.
    pub const MAX: Self = Self(100);

    /// Score of an identity never seen before.
    pub const UNSEEN: Self = Self(0);

    /// Points gained on a positive outcome.
    pub const REWARD: u8 = 1;

    /// Points lost on a negative outcome.
    pub const PENALTY: u8 = 5;

    /// Create a score, clamping to the valid range.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > Self::MAX.0 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Score after a positive outcome.
    #[must_use]
    pub const fn rewarded(self) -> Self {
        Self::new(self.0.saturating_add(Self::REWARD))
    }

    /// Score after a negative outcome.
    #[must_use]
    pub const fn penalized(self) -> Self {
        Self(self.0.saturating_sub(Self::PENALTY))
    }
}
