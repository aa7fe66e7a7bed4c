//! The reputation ledger.
//!
//! [`ReputationLedger`] owns every report, aggregate, score and counter. All
//! mutations take the state lock exclusively for their whole duration and
//! either apply completely or return an error with nothing changed. Reads
//! share the lock and always see the state between two whole mutations.
//! Events reach the sink in sequence order, one at a time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::amount::Amount;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::events::{EventEnvelope, EventSink, LedgerEvent, TracingEventSink};
use crate::metrics::{RiskAnalysis, SecurityMetrics};
use crate::report::{ReportId, ThreatReport};
use crate::reputation::{ContractReputation, ReporterScore};
use crate::store::{Disbursement, LedgerSnapshot, ReporterScoreEntry, SNAPSHOT_VERSION};
use crate::threat::{is_high_risk_score, ThreatType, MAX_RISK_SCORE};

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// The validated report.
    pub report_id: ReportId,
    /// Reporter whose score changed.
    pub reporter: Address,
    /// Verdict recorded.
    pub is_valid: bool,
    /// Reporter's score after the adjustment.
    pub reporter_score: ReporterScore,
    /// Reward paid to the validator, `None` if the balance fell short.
    pub reward_paid: Option<Amount>,
}

/// A new threat report as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSubmission {
    /// Contract being reported.
    pub target: Address,
    /// Alleged threat.
    pub threat_type: ThreatType,
    /// Risk score, 0..=100.
    pub risk_score: u8,
    /// Evidence text or reference.
    pub evidence: String,
}

impl ReportSubmission {
    /// Create a submission.
    #[must_use]
    pub fn new(
        target: Address,
        threat_type: ThreatType,
        risk_score: u8,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            target,
            threat_type,
            risk_score,
            evidence: evidence.into(),
        }
    }

    /// Check the input-only preconditions.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero target, out-of-range score or
    /// empty evidence.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_zero() {
            return Err(LedgerError::InvalidTarget { target: self.target });
        }
        if self.risk_score > MAX_RISK_SCORE {
            return Err(LedgerError::InvalidRiskScore {
                score: self.risk_score,
                max: MAX_RISK_SCORE,
            });
        }
        if self.evidence.trim().is_empty() {
            return Err(LedgerError::EmptyEvidence);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LedgerState {
    owner: Address,
    report_fee: Amount,
    validation_reward: Amount,
    balance: Amount,
    disbursed: HashMap<Address, Amount>,
    validators: HashSet<Address>,
    reporter_scores: HashMap<Address, ReporterScore>,
    reports: HashMap<ReportId, ThreatReport>,
    report_order: Vec<ReportId>,
    reputations: HashMap<Address, ContractReputation>,
    metrics: SecurityMetrics,
    report_nonce: u64,
    event_sequence: u64,
}

impl LedgerState {
    fn genesis(config: &LedgerConfig) -> Self {
        let mut validators = HashSet::new();
        validators.insert(config.owner);
        let mut reporter_scores = HashMap::new();
        reporter_scores.insert(config.owner, ReporterScore::MAX);

        Self {
            owner: config.owner,
            report_fee: config.report_fee,
            validation_reward: config.validation_reward,
            balance: Amount::ZERO,
            disbursed: HashMap::new(),
            validators,
            reporter_scores,
            reports: HashMap::new(),
            report_order: Vec::new(),
            reputations: HashMap::new(),
            metrics: SecurityMetrics::default(),
            report_nonce: 0,
            event_sequence: 0,
        }
    }

    fn score_of(&self, identity: &Address) -> ReporterScore {
        self.reporter_scores
            .get(identity)
            .copied()
            .unwrap_or(ReporterScore::UNSEEN)
    }

    fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            warn!(caller = %caller, "owner-only operation rejected");
            Err(LedgerError::NotOwner { caller: *caller })
        }
    }

    fn credited(&self, identity: &Address, amount: Amount) -> Result<Amount> {
        self.disbursed
            .get(identity)
            .copied()
            .unwrap_or(Amount::ZERO)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { what: "disbursed amount" })
    }

    fn to_snapshot(&self) -> LedgerSnapshot {
        let mut disbursements: Vec<Disbursement> = self
            .disbursed
            .iter()
            .map(|(identity, amount)| Disbursement {
                identity: *identity,
                amount: *amount,
            })
            .collect();
        disbursements.sort_by_key(|d| d.identity);

        let mut validators: Vec<Address> = self.validators.iter().copied().collect();
        validators.sort();

        let mut reporter_scores: Vec<ReporterScoreEntry> = self
            .reporter_scores
            .iter()
            .map(|(identity, score)| ReporterScoreEntry {
                identity: *identity,
                score: *score,
            })
            .collect();
        reporter_scores.sort_by_key(|e| e.identity);

        let reports = self
            .report_order
            .iter()
            .filter_map(|id| self.reports.get(id).cloned())
            .collect();

        let mut reputations: Vec<ContractReputation> =
            self.reputations.values().cloned().collect();
        reputations.sort_by_key(|r| r.target);

        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            owner: self.owner,
            report_fee: self.report_fee,
            validation_reward: self.validation_reward,
            balance: self.balance,
            disbursements,
            validators,
            reporter_scores,
            reports,
            reputations,
            metrics: self.metrics,
            report_nonce: self.report_nonce,
            event_sequence: self.event_sequence,
        }
    }

    fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.verify()?;

        let report_order = snapshot.reports.iter().map(|r| r.id).collect();
        Ok(Self {
            owner: snapshot.owner,
            report_fee: snapshot.report_fee,
            validation_reward: snapshot.validation_reward,
            balance: snapshot.balance,
            disbursed: snapshot
                .disbursements
                .into_iter()
                .map(|d| (d.identity, d.amount))
                .collect(),
            validators: snapshot.validators.into_iter().collect(),
            reporter_scores: snapshot
                .reporter_scores
                .into_iter()
                .map(|e| (e.identity, e.score))
                .collect(),
            reports: snapshot.reports.into_iter().map(|r| (r.id, r)).collect(),
            report_order,
            reputations: snapshot
                .reputations
                .into_iter()
                .map(|r| (r.target, r))
                .collect(),
            metrics: snapshot.metrics,
            report_nonce: snapshot.report_nonce,
            event_sequence: snapshot.event_sequence,
        })
    }
}

/// Community threat-report ledger.
///
/// Share it between threads with `Arc`; every method takes `&self`.
pub struct ReputationLedger {
    state: RwLock<LedgerState>,
    sink: Box<dyn EventSink>,
    /// Envelopes awaiting delivery, pushed under the state write lock.
    outbox: Mutex<VecDeque<EventEnvelope>>,
    /// Held by whichever thread is currently draining the outbox.
    dispatch: Mutex<()>,
}

impl fmt::Debug for ReputationLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ReputationLedger")
            .field("owner", &state.owner)
            .field("reports", &state.reports.len())
            .field("targets", &state.reputations.len())
            .field("validators", &state.validators.len())
            .finish_non_exhaustive()
    }
}

impl ReputationLedger {
    /// Create a ledger at genesis. The owner starts as the only validator
    /// with a reporter score of 100.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        info!(
            owner = %config.owner,
            report_fee = %config.report_fee,
            validation_reward = %config.validation_reward,
            "ledger created"
        );
        Ok(Self::with_state(LedgerState::genesis(&config)))
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::CorruptSnapshot`] if the snapshot is
    /// inconsistent.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self> {
        let state = LedgerState::from_snapshot(snapshot)?;
        debug!(reports = state.reports.len(), "ledger restored from snapshot");
        Ok(Self::with_state(state))
    }

    fn with_state(state: LedgerState) -> Self {
        Self {
            state: RwLock::new(state),
            sink: Box::new(TracingEventSink::new()),
            outbox: Mutex::new(VecDeque::new()),
            dispatch: Mutex::new(()),
        }
    }

    /// Replace the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Run a mutation under the write lock, then deliver its events.
    fn commit<T>(
        &self,
        op: impl FnOnce(&mut LedgerState, &mut Vec<LedgerEvent>, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = Utc::now();
        let value = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let mut events = Vec::new();
            let value = op(state, &mut events, now)?;
            if !events.is_empty() {
                let mut outbox = self.outbox.lock();
                for event in events {
                    state.event_sequence = state.event_sequence.saturating_add(1);
                    outbox.push_back(EventEnvelope::new(state.event_sequence, now, event));
                }
            }
            value
        };
        self.deliver();
        Ok(value)
    }

    /// Drain the outbox into the sink.
    ///
    /// Only one thread delivers at a time; a writer that finds delivery in
    /// progress leaves its envelopes to that thread. The sink runs with no
    /// ledger lock held, so it may call back into the ledger, including
    /// mutations, whose events queue behind the current one.
    fn deliver(&self) {
        loop {
            let Some(turn) = self.dispatch.try_lock() else {
                return;
            };
            loop {
                let next = self.outbox.lock().pop_front();
                match next {
                    Some(envelope) => self.sink.emit(&envelope),
                    None => break,
                }
            }
            drop(turn);
            // A writer may have queued after the last pop but before the
            // turn was released.
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// File a threat report, attaching `paid` toward the report fee.
    ///
    /// The whole attached amount is retained in the ledger balance. Filing
    /// counts as a positive signal for the reporter's score.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientFee`] if `paid` is below the report fee
    /// - [`LedgerError::InvalidTarget`] for the zero address
    /// - [`LedgerError::InvalidRiskScore`] above 100
    /// - [`LedgerError::EmptyEvidence`] for blank evidence
    pub fn report_threat(
        &self,
        reporter: Address,
        submission: ReportSubmission,
        paid: Amount,
    ) -> Result<ReportId> {
        self.commit(|state, events, now| {
            if paid < state.report_fee {
                return Err(LedgerError::InsufficientFee {
                    required: state.report_fee,
                    paid,
                });
            }
            submission.validate()?;

            let balance = state
                .balance
                .checked_add(paid)
                .ok_or(LedgerError::Overflow { what: "ledger balance" })?;
            let next_nonce = state
                .report_nonce
                .checked_add(1)
                .ok_or(LedgerError::Overflow { what: "report nonce" })?;

            let ReportSubmission {
                target,
                threat_type,
                risk_score,
                evidence,
            } = submission;

            let first_report = !state.reputations.contains_key(&target);
            let mut reputation = state
                .reputations
                .get(&target)
                .cloned()
                .unwrap_or_else(|| ContractReputation::new(target, now));
            let change = reputation.apply_report(threat_type, risk_score, now)?;

            let mut metrics = state.metrics;
            if first_report {
                metrics.total_contracts = metrics
                    .total_contracts
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow { what: "total contracts" })?;
            }
            if change.newly_flagged {
                metrics.flagged_contracts = metrics
                    .flagged_contracts
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow { what: "flagged contracts" })?;
            }

            let id = ReportId::derive(&reporter, &target, threat_type, now, state.report_nonce);
            let report = ThreatReport {
                id,
                reporter,
                target,
                threat_type,
                risk_score,
                evidence: evidence.clone(),
                submitted_at: now,
                validated: false,
                validation_count: 0,
                verdict: None,
            };
            let report_count = reputation.report_count;

            // Everything fallible is done; apply.
            state.balance = balance;
            state.report_nonce = next_nonce;
            state.reports.insert(id, report);
            state.report_order.push(id);
            state.reputations.insert(target, reputation);
            state.metrics = metrics;
            let score = state.score_of(&reporter).rewarded();
            state.reporter_scores.insert(reporter, score);

            info!(
                report_id = %id,
                reporter = %reporter,
                target = %target,
                threat_type = %threat_type,
                risk_score,
                average_score = change.new_average,
                report_count,
                "threat reported"
            );

            events.push(LedgerEvent::ThreatReported {
                report_id: id,
                reporter,
                target,
                threat_type,
                risk_score,
                evidence,
            });
            events.push(LedgerEvent::ReputationUpdated {
                target,
                average_score: change.new_average,
                report_count,
            });
            if change.newly_flagged {
                events.push(LedgerEvent::ContractFlagged {
                    target,
                    average_score: change.new_average,
                });
            }

            Ok(id)
        })
    }

    /// Record a validator's verdict on a report.
    ///
    /// A valid verdict raises the reporter's score by 1, an invalid one lowers
    /// it by 5. The validator is paid the validation reward when the balance
    /// covers it; otherwise the verdict still stands and no reward is paid.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotValidator`] if `validator` is not in the set
    /// - [`LedgerError::ReportNotFound`] for an unknown id
    /// - [`LedgerError::AlreadyValidated`] for a decided report
    pub fn validate_report(
        &self,
        validator: Address,
        report_id: ReportId,
        is_valid: bool,
    ) -> Result<ValidationOutcome> {
        self.commit(|state, events, now| {
            if !state.validators.contains(&validator) {
                warn!(caller = %validator, report_id = %report_id, "validation by non-validator rejected");
                return Err(LedgerError::NotValidator { caller: validator });
            }
            let report = state
                .reports
                .get(&report_id)
                .ok_or(LedgerError::ReportNotFound { id: report_id })?;
            if report.validated {
                return Err(LedgerError::AlreadyValidated { id: report_id });
            }
            let reporter = report.reporter;

            let mut metrics = state.metrics;
            if is_valid {
                metrics.validated_reports = metrics
                    .validated_reports
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow { what: "validated reports" })?;
            } else {
                metrics.false_positives = metrics
                    .false_positives
                    .checked_add(1)
                    .ok_or(LedgerError::Overflow { what: "false positives" })?;
            }

            let reward = state.validation_reward;
            let payout = match state.balance.checked_sub(reward) {
                Some(remaining) => Some((remaining, state.credited(&validator, reward)?)),
                None => None,
            };

            state
                .reports
                .get_mut(&report_id)
                .ok_or(LedgerError::ReportNotFound { id: report_id })?
                .record_verdict(validator, is_valid, now)?;
            state.metrics = metrics;

            let previous = state.score_of(&reporter);
            let reporter_score = if is_valid {
                previous.rewarded()
            } else {
                previous.penalized()
            };
            state.reporter_scores.insert(reporter, reporter_score);

            info!(
                report_id = %report_id,
                validator = %validator,
                reporter = %reporter,
                is_valid,
                reporter_score = reporter_score.value(),
                "report validated"
            );
            events.push(LedgerEvent::ReportValidated {
                report_id,
                validator,
                reporter,
                is_valid,
            });

            let reward_paid = if let Some((remaining, credited)) = payout {
                state.balance = remaining;
                state.disbursed.insert(validator, credited);
                events.push(LedgerEvent::RewardPaid {
                    validator,
                    amount: reward,
                });
                Some(reward)
            } else {
                warn!(
                    validator = %validator,
                    required = %reward,
                    available = %state.balance,
                    "balance too low for validation reward"
                );
                events.push(LedgerEvent::RewardUnpaid {
                    validator,
                    required: reward,
                    available: state.balance,
                });
                None
            };

            Ok(ValidationOutcome {
                report_id,
                reporter,
                is_valid,
                reporter_score,
                reward_paid,
            })
        })
    }

    /// Add an identity to the validator set and reset its score to 100.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`] or [`LedgerError::ValidatorExists`].
    pub fn add_validator(&self, caller: Address, identity: Address) -> Result<()> {
        self.commit(|state, events, _| {
            state.ensure_owner(&caller)?;
            if !state.validators.insert(identity) {
                return Err(LedgerError::ValidatorExists { identity });
            }
            state.reporter_scores.insert(identity, ReporterScore::MAX);
            info!(validator = %identity, "validator added");
            events.push(LedgerEvent::ValidatorAdded {
                validator: identity,
            });
            Ok(())
        })
    }

    /// Remove an identity from the validator set. Its score is kept.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`] or [`LedgerError::ValidatorMissing`].
    pub fn remove_validator(&self, caller: Address, identity: Address) -> Result<()> {
        self.commit(|state, events, _| {
            state.ensure_owner(&caller)?;
            if !state.validators.remove(&identity) {
                return Err(LedgerError::ValidatorMissing { identity });
            }
            info!(validator = %identity, "validator removed");
            events.push(LedgerEvent::ValidatorRemoved {
                validator: identity,
            });
            Ok(())
        })
    }

    /// Overwrite the report fee and validation reward.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`].
    pub fn update_fees(
        &self,
        caller: Address,
        report_fee: Amount,
        validation_reward: Amount,
    ) -> Result<()> {
        self.commit(|state, events, _| {
            state.ensure_owner(&caller)?;
            state.report_fee = report_fee;
            state.validation_reward = validation_reward;
            info!(%report_fee, %validation_reward, "fees updated");
            events.push(LedgerEvent::FeesUpdated {
                report_fee,
                validation_reward,
            });
            Ok(())
        })
    }

    /// Transfer the entire balance to the owner. Returns the amount moved.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`].
    pub fn emergency_withdraw(&self, caller: Address) -> Result<Amount> {
        self.commit(|state, events, _| {
            state.ensure_owner(&caller)?;
            let amount = state.balance;
            let credited = state.credited(&caller, amount)?;
            state.balance = Amount::ZERO;
            state.disbursed.insert(caller, credited);
            warn!(owner = %caller, %amount, "emergency withdrawal");
            events.push(LedgerEvent::EmergencyWithdrawal {
                owner: caller,
                amount,
            });
            Ok(amount)
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Risk summary for a target. Unreported targets are SAFE with score 0.
    #[must_use]
    pub fn risk_analysis(&self, target: &Address) -> RiskAnalysis {
        let state = self.state.read();
        let analysis = state
            .reputations
            .get(target)
            .map_or_else(|| RiskAnalysis::unreported(*target), RiskAnalysis::from_reputation);
        debug!(target = %target, risk_score = analysis.risk_score, "risk analysis");
        analysis
    }

    /// Whether the target's average exceeds 70, with that average.
    #[must_use]
    pub fn is_high_risk(&self, target: &Address) -> (bool, u8) {
        let score = self
            .state
            .read()
            .reputations
            .get(target)
            .map_or(0, ContractReputation::average_score);
        (is_high_risk_score(score), score)
    }

    /// Snapshot of the ledger-wide counters.
    #[must_use]
    pub fn security_metrics(&self) -> SecurityMetrics {
        self.state.read().metrics
    }

    /// Current report fee.
    #[must_use]
    pub fn report_fee(&self) -> Amount {
        self.state.read().report_fee
    }

    /// Current validation reward.
    #[must_use]
    pub fn validation_reward(&self) -> Amount {
        self.state.read().validation_reward
    }

    /// Owner identity.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.state.read().owner
    }

    /// Retained balance.
    #[must_use]
    pub fn balance(&self) -> Amount {
        self.state.read().balance
    }

    /// Total paid out to an identity (rewards and withdrawals).
    #[must_use]
    pub fn disbursed_to(&self, identity: &Address) -> Amount {
        self.state
            .read()
            .disbursed
            .get(identity)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// A report by id.
    #[must_use]
    pub fn report(&self, id: &ReportId) -> Option<ThreatReport> {
        self.state.read().reports.get(id).cloned()
    }

    /// All reports against a target, in submission order.
    #[must_use]
    pub fn reports_for(&self, target: &Address) -> Vec<ThreatReport> {
        let state = self.state.read();
        state
            .report_order
            .iter()
            .filter_map(|id| state.reports.get(id))
            .filter(|r| r.target == *target)
            .cloned()
            .collect()
    }

    /// Number of reports ever filed.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.state.read().reports.len()
    }

    /// Stored aggregate for a target, if it was ever reported.
    #[must_use]
    pub fn reputation(&self, target: &Address) -> Option<ContractReputation> {
        self.state.read().reputations.get(target).cloned()
    }

    /// An identity's reporter score; 0 if never seen.
    #[must_use]
    pub fn reporter_score(&self, identity: &Address) -> ReporterScore {
        self.state.read().score_of(identity)
    }

    /// Whether an identity may validate.
    #[must_use]
    pub fn is_validator(&self, identity: &Address) -> bool {
        self.state.read().validators.contains(identity)
    }

    /// Validator set, sorted.
    #[must_use]
    pub fn validators(&self) -> Vec<Address> {
        let mut validators: Vec<Address> = self.state.read().validators.iter().copied().collect();
        validators.sort();
        validators
    }

    /// Consistent copy of the full state.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().to_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn owner() -> Address {
        addr(0xaa)
    }

    fn ledger() -> ReputationLedger {
        ReputationLedger::new(LedgerConfig::new(owner())).unwrap()
    }

    fn submit(ledger: &ReputationLedger, reporter: Address, target: Address, score: u8) -> ReportId {
        ledger
            .report_threat(
                reporter,
                ReportSubmission::new(target, ThreatType::Honeypot, score, "evidence"),
                ledger.report_fee(),
            )
            .unwrap()
    }

    #[test]
    fn genesis_state() {
        let ledger = ledger();
        assert_eq!(ledger.owner(), owner());
        assert!(ledger.is_validator(&owner()));
        assert_eq!(ledger.reporter_score(&owner()), ReporterScore::MAX);
        assert_eq!(ledger.security_metrics(), SecurityMetrics::default());
        assert_eq!(ledger.balance(), Amount::ZERO);
    }

    #[test]
    fn rejects_zero_owner() {
        assert!(ReputationLedger::new(LedgerConfig::new(Address::ZERO)).is_err());
    }

    #[test]
    fn report_retains_full_payment() {
        let ledger = ledger();
        let paid = Amount::from_tokens(1);
        ledger
            .report_threat(
                addr(1),
                ReportSubmission::new(addr(2), ThreatType::Rugpull, 40, "drain fn"),
                paid,
            )
            .unwrap();
        assert_eq!(ledger.balance(), paid);
    }

    #[test]
    fn insufficient_fee_changes_nothing() {
        let ledger = ledger();
        let err = ledger
            .report_threat(
                addr(1),
                ReportSubmission::new(addr(2), ThreatType::Rugpull, 40, "drain fn"),
                Amount::from_wei(1),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFee { .. }));
        assert_eq!(ledger.report_count(), 0);
        assert_eq!(ledger.balance(), Amount::ZERO);
        assert_eq!(ledger.reporter_score(&addr(1)), ReporterScore::UNSEEN);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let ledger = ledger();
        let fee = ledger.report_fee();
        let cases = [
            ReportSubmission::new(Address::ZERO, ThreatType::Phishing, 10, "x"),
            ReportSubmission::new(addr(2), ThreatType::Phishing, 101, "x"),
            ReportSubmission::new(addr(2), ThreatType::Phishing, 10, "   "),
        ];
        for submission in cases {
            let err = ledger.report_threat(addr(1), submission, fee).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Validation);
        }
        assert_eq!(ledger.report_count(), 0);
        assert_eq!(ledger.security_metrics().total_contracts, 0);
    }

    #[test]
    fn same_instant_reports_get_distinct_ids() {
        let ledger = ledger();
        let a = submit(&ledger, addr(1), addr(2), 50);
        let b = submit(&ledger, addr(1), addr(2), 50);
        assert_ne!(a, b);
        assert_eq!(ledger.reports_for(&addr(2)).len(), 2);
    }

    #[test]
    fn reward_paid_when_balance_covers_it() {
        let ledger = ledger();
        let id = submit(&ledger, addr(1), addr(2), 50);
        let outcome = ledger.validate_report(owner(), id, true).unwrap();
        assert_eq!(outcome.reward_paid, Some(ledger.validation_reward()));
        assert_eq!(ledger.disbursed_to(&owner()), ledger.validation_reward());
        // 0.001 - 0.0005
        assert_eq!(ledger.balance(), "0.0005".parse().unwrap());
    }

    #[test]
    fn reward_shortfall_still_commits() {
        let ledger = ledger();
        ledger
            .update_fees(owner(), Amount::ZERO, Amount::from_tokens(5))
            .unwrap();
        let id = submit(&ledger, addr(1), addr(2), 50);
        let outcome = ledger.validate_report(owner(), id, false).unwrap();
        assert_eq!(outcome.reward_paid, None);
        assert!(ledger.report(&id).unwrap().validated);
        assert_eq!(ledger.security_metrics().false_positives, 1);
        assert_eq!(ledger.disbursed_to(&owner()), Amount::ZERO);
    }

    #[test]
    fn reward_equal_to_balance_drains_it() {
        let ledger = ledger();
        let fee: Amount = "0.001".parse().unwrap();
        ledger.update_fees(owner(), fee, fee).unwrap();
        let id = submit(&ledger, addr(1), addr(2), 50);
        assert_eq!(ledger.balance(), fee);

        let outcome = ledger.validate_report(owner(), id, true).unwrap();
        assert_eq!(outcome.reward_paid, Some(fee));
        assert_eq!(ledger.balance(), Amount::ZERO);
        assert_eq!(ledger.disbursed_to(&owner()), fee);
    }

    #[test]
    fn validation_records_verdict_on_report() {
        let ledger = ledger();
        let id = submit(&ledger, addr(1), addr(2), 50);
        ledger.validate_report(owner(), id, true).unwrap();

        let report = ledger.report(&id).unwrap();
        assert!(report.validated);
        assert_eq!(report.validation_count, 1);
        let verdict = report.verdict.unwrap();
        assert_eq!(verdict.validator, owner());
        assert!(verdict.valid);
        assert_eq!(ledger.security_metrics().validated_reports, 1);
        ledger.snapshot().verify().unwrap();
    }

    #[test]
    fn owner_only_operations() {
        let ledger = ledger();
        let intruder = addr(9);
        assert!(matches!(
            ledger.add_validator(intruder, addr(3)),
            Err(LedgerError::NotOwner { .. })
        ));
        assert!(ledger.remove_validator(intruder, owner()).is_err());
        assert!(ledger.update_fees(intruder, Amount::ZERO, Amount::ZERO).is_err());
        assert!(ledger.emergency_withdraw(intruder).is_err());
        assert!(!ledger.is_validator(&addr(3)));
    }

    #[test]
    fn validator_membership_conflicts() {
        let ledger = ledger();
        ledger.add_validator(owner(), addr(3)).unwrap();
        assert!(matches!(
            ledger.add_validator(owner(), addr(3)),
            Err(LedgerError::ValidatorExists { .. })
        ));
        ledger.remove_validator(owner(), addr(3)).unwrap();
        assert!(matches!(
            ledger.remove_validator(owner(), addr(3)),
            Err(LedgerError::ValidatorMissing { .. })
        ));
    }

    #[test]
    fn adding_validator_resets_score() {
        let ledger = ledger();
        submit(&ledger, addr(3), addr(2), 10);
        assert_eq!(ledger.reporter_score(&addr(3)).value(), 1);
        ledger.add_validator(owner(), addr(3)).unwrap();
        assert_eq!(ledger.reporter_score(&addr(3)), ReporterScore::MAX);
    }

    #[test]
    fn emergency_withdraw_drains_balance() {
        let ledger = ledger();
        submit(&ledger, addr(1), addr(2), 10);
        submit(&ledger, addr(1), addr(2), 10);
        let moved = ledger.emergency_withdraw(owner()).unwrap();
        assert_eq!(moved, "0.002".parse().unwrap());
        assert_eq!(ledger.balance(), Amount::ZERO);
        assert_eq!(ledger.disbursed_to(&owner()), moved);
        assert_eq!(ledger.emergency_withdraw(owner()).unwrap(), Amount::ZERO);
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<parking_lot::Mutex<Vec<EventEnvelope>>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, envelope: &EventEnvelope) {
            self.events.lock().push(envelope.clone());
        }
    }

    #[test]
    fn events_are_sequenced() {
        let sink = RecordingSink::default();
        let ledger = ledger().with_event_sink(sink.clone());
        submit(&ledger, addr(1), addr(2), 90);

        let events = sink.events.lock();
        let types: Vec<&str> = events.iter().map(|e| e.event.event_type()).collect();
        assert_eq!(types, vec!["threat_reported", "reputation_updated", "contract_flagged"]);
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn rejected_operations_emit_nothing() {
        let sink = RecordingSink::default();
        let ledger = ledger().with_event_sink(sink.clone());
        let _ = ledger.add_validator(addr(9), addr(3));
        let _ = ledger.validate_report(addr(9), ReportId::from_bytes([0; 32]), true);
        assert!(sink.events.lock().is_empty());
    }

    /// A sink that reads the ledger back while handling an event.
    struct ReentrantSink {
        ledger: Arc<parking_lot::Mutex<Option<Arc<ReputationLedger>>>>,
        observed: Arc<AtomicUsize>,
    }

    impl EventSink for ReentrantSink {
        fn emit(&self, envelope: &EventEnvelope) {
            if let LedgerEvent::ThreatReported { target, .. } = &envelope.event {
                if let Some(ledger) = self.ledger.lock().as_ref() {
                    let count = ledger.risk_analysis(target).report_count;
                    self.observed.store(count as usize, Ordering::SeqCst);
                }
            }
        }
    }

    #[test]
    fn sinks_may_call_back_into_the_ledger() {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let observed = Arc::new(AtomicUsize::new(0));
        let ledger = Arc::new(ledger().with_event_sink(ReentrantSink {
            ledger: Arc::clone(&slot),
            observed: Arc::clone(&observed),
        }));
        *slot.lock() = Some(Arc::clone(&ledger));

        submit(&ledger, addr(1), addr(2), 20);
        assert_eq!(observed.load(Ordering::SeqCst), 1);

        // Break the cycle.
        slot.lock().take();
    }

    #[test]
    fn concurrent_writers_deliver_in_sequence_order() {
        let sink = RecordingSink::default();
        let ledger = Arc::new(ledger().with_event_sink(sink.clone()));

        let handles: Vec<_> = (0..8u8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..25u8 {
                        submit(&ledger, addr(t + 1), addr(0x40 + i), 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<u64> = sink.events.lock().iter().map(|e| e.sequence).collect();
        // Each low-score report emits threat_reported and reputation_updated.
        let expected: Vec<u64> = (1..=400).collect();
        assert_eq!(sequences, expected);
    }

    /// A sink that raises the fees once the first contract is flagged.
    struct FeeRaisingSink {
        ledger: Arc<parking_lot::Mutex<Option<Arc<ReputationLedger>>>>,
        recorded: RecordingSink,
    }

    impl EventSink for FeeRaisingSink {
        fn emit(&self, envelope: &EventEnvelope) {
            self.recorded.emit(envelope);
            if matches!(envelope.event, LedgerEvent::ContractFlagged { .. }) {
                let ledger = self.ledger.lock().clone();
                if let Some(ledger) = ledger {
                    ledger
                        .update_fees(owner(), Amount::from_tokens(1), Amount::ZERO)
                        .unwrap();
                }
            }
        }
    }

    #[test]
    fn sinks_may_mutate_the_ledger() {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let recorded = RecordingSink::default();
        let ledger = Arc::new(ledger().with_event_sink(FeeRaisingSink {
            ledger: Arc::clone(&slot),
            recorded: recorded.clone(),
        }));
        *slot.lock() = Some(Arc::clone(&ledger));

        submit(&ledger, addr(1), addr(2), 90);
        assert_eq!(ledger.report_fee(), Amount::from_tokens(1));

        let events = recorded.events.lock();
        let types: Vec<&str> = events.iter().map(|e| e.event.event_type()).collect();
        assert_eq!(
            types,
            vec!["threat_reported", "reputation_updated", "contract_flagged", "fees_updated"]
        );
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        drop(events);

        slot.lock().take();
    }
}
