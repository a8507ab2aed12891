//! Event types for the persistence event log.
//!
//! Every mutation of marketplace state is recorded as one event, appended to
//! the log in JSON Lines format. Replaying the log from a snapshot's
//! position reconstructs the exact in-memory state, which is how the store
//! recovers after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Decision, ProofUrl, Ticket, Transaction, TxnRef};

/// An event in the event log.
///
/// Serialized as one JSON object per line, with the payload flattened:
///
/// ```json
/// {"seq":4,"ts":"2026-03-01T10:00:00Z","type":"proof_attached","reference":"…","proof":"…"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Monotonic sequence number; used for replay positioning and ordering.
    pub seq: u64,

    /// When the event was recorded (UTC).
    pub ts: DateTime<Utc>,

    /// The event payload, flattened into the JSON object.
    #[serde(flatten)]
    pub payload: LedgerEventPayload,
}

impl LedgerEvent {
    /// Creates an event with the given sequence number, stamped now.
    pub fn new(seq: u64, payload: LedgerEventPayload) -> Self {
        LedgerEvent {
            seq,
            ts: Utc::now(),
            payload,
        }
    }

    /// Returns true if this event must be fsynced before the operation is
    /// acknowledged.
    ///
    /// Transaction lifecycle events are critical: they move money and stock.
    /// Catalog registration is batchable — the caller syncs once after
    /// seeding.
    pub fn is_critical(&self) -> bool {
        self.payload.is_critical()
    }
}

/// Event payload variants, tagged with a stable `type` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEventPayload {
    /// A ticket type was added to the catalog with its initial allotment.
    #[serde(rename = "ticket_registered")]
    TicketRegistered {
        /// The full ticket record, including initial stock.
        ticket: Ticket,
    },

    /// A reservation was committed: the transaction, its line items, and the
    /// matching stock decrements, as one atomic unit.
    #[serde(rename = "transaction_created")]
    TransactionCreated {
        /// The complete transaction record, line items included. Stock
        /// decrements are implied by the items.
        transaction: Transaction,
    },

    /// The buyer attached a payment proof; status moved to
    /// `WAITING_FOR_CONFIRMATION`.
    #[serde(rename = "proof_attached")]
    ProofAttached {
        /// The transaction's public reference.
        reference: TxnRef,
        /// Durable reference to the uploaded proof.
        proof: ProofUrl,
    },

    /// The organizer decided. A rejection implies restoring every line
    /// item's stock.
    #[serde(rename = "decision_recorded")]
    DecisionRecorded {
        /// The transaction's public reference.
        reference: TxnRef,
        /// The verdict.
        decision: Decision,
    },

    /// The payment window elapsed; status moved to `EXPIRED` and every line
    /// item's stock was restored.
    #[serde(rename = "transaction_expired")]
    TransactionExpired {
        /// The transaction's public reference.
        reference: TxnRef,
    },
}

impl LedgerEventPayload {
    /// See [`LedgerEvent::is_critical`].
    pub fn is_critical(&self) -> bool {
        !matches!(self, LedgerEventPayload::TicketRegistered { .. })
    }

    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEventPayload::TicketRegistered { .. } => "ticket_registered",
            LedgerEventPayload::TransactionCreated { .. } => "transaction_created",
            LedgerEventPayload::ProofAttached { .. } => "proof_attached",
            LedgerEventPayload::DecisionRecorded { .. } => "decision_recorded",
            LedgerEventPayload::TransactionExpired { .. } => "transaction_expired",
        }
    }
}
