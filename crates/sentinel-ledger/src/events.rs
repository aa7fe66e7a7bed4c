//! Ledger notifications and the sinks that deliver them.
//!
//! Every committed mutation produces one or more [`LedgerEvent`]s. The ledger
//! buffers them while it holds its state lock and hands them to the configured
//! [`EventSink`] only after the lock is released, so a sink may safely call
//! back into the ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::address::Address;
use crate::amount::Amount;
use crate::report::ReportId;
use crate::threat::ThreatType;

/// Default capacity of a [`BroadcastEventSink`] channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Something that happened on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A threat report was filed.
    ThreatReported {
        /// New report id.
        report_id: ReportId,
        /// Filing identity.
        reporter: Address,
        /// Reported contract.
        target: Address,
        /// Alleged threat.
        threat_type: ThreatType,
        /// Reported risk score.
        risk_score: u8,
        /// Evidence text.
        evidence: String,
    },
    /// A target's aggregate changed.
    ReputationUpdated {
        /// Target contract.
        target: Address,
        /// Average after the update.
        average_score: u8,
        /// Reports after the update.
        report_count: u64,
    },
    /// A target crossed the high-risk threshold for the first time.
    ContractFlagged {
        /// Target contract.
        target: Address,
        /// Average that crossed.
        average_score: u8,
    },
    /// A validator decided on a report.
    ReportValidated {
        /// Report id.
        report_id: ReportId,
        /// Deciding validator.
        validator: Address,
        /// Original reporter.
        reporter: Address,
        /// Verdict.
        is_valid: bool,
    },
    /// A validation reward was paid out.
    RewardPaid {
        /// Recipient.
        validator: Address,
        /// Amount paid.
        amount: Amount,
    },
    /// A validation reward could not be covered by the balance.
    RewardUnpaid {
        /// Intended recipient.
        validator: Address,
        /// Configured reward.
        required: Amount,
        /// Balance at the time.
        available: Amount,
    },
    /// Identity added to the validator set.
    ValidatorAdded {
        /// The identity.
        validator: Address,
    },
    /// Identity removed from the validator set.
    ValidatorRemoved {
        /// The identity.
        validator: Address,
    },
    /// Fee configuration changed.
    FeesUpdated {
        /// New report fee.
        report_fee: Amount,
        /// New validation reward.
        validation_reward: Amount,
    },
    /// Owner drained the balance.
    EmergencyWithdrawal {
        /// Owner.
        owner: Address,
        /// Amount moved.
        amount: Amount,
    },
}

impl LedgerEvent {
    /// Short, stable name of the event kind.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ThreatReported { .. } => "threat_reported",
            Self::ReputationUpdated { .. } => "reputation_updated",
            Self::ContractFlagged { .. } => "contract_flagged",
            Self::ReportValidated { .. } => "report_validated",
            Self::RewardPaid { .. } => "reward_paid",
            Self::RewardUnpaid { .. } => "reward_unpaid",
            Self::ValidatorAdded { .. } => "validator_added",
            Self::ValidatorRemoved { .. } => "validator_removed",
            Self::FeesUpdated { .. } => "fees_updated",
            Self::EmergencyWithdrawal { .. } => "emergency_withdrawal",
        }
    }

    /// Whether watchers should treat the event as a warning.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::ContractFlagged { .. } | Self::RewardUnpaid { .. } | Self::EmergencyWithdrawal { .. }
        )
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// An event with delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique id of this delivery.
    pub event_id: Uuid,
    /// Position in the ledger's event stream, starting at 1. A sink sees
    /// envelopes in strictly increasing sequence order.
    pub sequence: u64,
    /// When the mutation committed.
    pub timestamp: DateTime<Utc>,
    /// The event.
    pub event: LedgerEvent,
}

impl EventEnvelope {
    /// Wrap an event.
    #[must_use]
    pub fn new(sequence: u64, timestamp: DateTime<Utc>, event: LedgerEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sequence,
            timestamp,
            event,
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Destination for ledger events.
///
/// Calls are never concurrent: the ledger delivers one envelope at a time,
/// possibly from a different thread than the one that committed it.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, envelope: &EventEnvelope);
}

/// Sink that writes events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates a new tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        let event_type = envelope.event.event_type();
        let json = serde_json::to_string(&envelope.event).unwrap_or_else(|_| "{}".to_string());
        if envelope.event.is_warning() {
            tracing::warn!(
                target: "sentinel_ledger",
                event_id = %envelope.event_id,
                sequence = envelope.sequence,
                %event_type,
                event_json = %json,
                "ledger event"
            );
        } else {
            tracing::info!(
                target: "sentinel_ledger",
                event_id = %envelope.event_id,
                sequence = envelope.sequence,
                %event_type,
                event_json = %json,
                "ledger event"
            );
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _envelope: &EventEnvelope) {}
}

/// Sink that fans events out to live subscribers.
///
/// Slow subscribers lag and lose the oldest events rather than blocking the
/// ledger.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventSink {
    /// Create a sink with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a sink with a specific channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        // No subscribers is not an error.
        let _ = self.tx.send(envelope.clone());
    }
}

/// Sink that forwards to several sinks in order.
#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutEventSink {
    /// Create an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    #[must_use]
    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True without sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanoutEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutEventSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        for sink in &self.sinks {
            sink.emit(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct CountingSink {
        count: Arc<AtomicUsize>,
    }

    impl EventSink for CountingSink {
        fn emit(&self, _envelope: &EventEnvelope) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample(sequence: u64) -> EventEnvelope {
        EventEnvelope::new(
            sequence,
            Utc::now(),
            LedgerEvent::ReputationUpdated {
                target: Address::from_bytes([5; 20]),
                average_score: 42,
                report_count: 3,
            },
        )
    }

    #[test]
    fn event_type_names() {
        let event = LedgerEvent::ValidatorAdded {
            validator: Address::from_bytes([1; 20]),
        };
        assert_eq!(event.event_type(), "validator_added");
        assert_eq!(event.to_string(), "validator_added");
        assert!(!event.is_warning());

        let flagged = LedgerEvent::ContractFlagged {
            target: Address::from_bytes([1; 20]),
            average_score: 80,
        };
        assert!(flagged.is_warning());
    }

    #[test]
    fn envelope_json_is_tagged() {
        let json = sample(1).to_json().unwrap();
        assert!(json.contains(r#""type":"reputation_updated""#));
        assert!(json.contains(r#""sequence":1"#));
    }

    #[test]
    fn envelope_ids_are_unique() {
        assert_ne!(sample(1).event_id, sample(1).event_id);
    }

    #[test]
    fn tracing_and_noop_sinks_accept_events() {
        TracingEventSink::new().emit(&sample(1));
        NoopEventSink.emit(&sample(2));
    }

    #[test]
    fn fanout_forwards_to_every_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = FanoutEventSink::new()
            .with(CountingSink { count: Arc::clone(&count) })
            .with(CountingSink { count: Arc::clone(&count) });
        assert_eq!(sink.len(), 2);
        sink.emit(&sample(1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let sink = BroadcastEventSink::with_capacity(4);
        assert_eq!(sink.subscriber_count(), 0);
        sink.emit(&sample(1));
    }

    #[tokio::test]
    async fn broadcast_delivers_in_order() {
        let sink = BroadcastEventSink::new();
        let mut rx = sink.subscribe();
        sink.emit(&sample(1));
        sink.emit(&sample(2));

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 2);
    }
}
