//! Transaction records and their line items.
//!
//! A transaction is created once per checkout, owns its line items, and is
//! never deleted — terminal states are retained for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ProofUrl, TicketId, TransactionId, TxnRef, UserId};
use super::money::Money;

/// The finite status of a transaction.
///
/// Serialized with the wire tokens used by API clients
/// (`WAITING_FOR_PAYMENT`, ..., `REJECT`, `EXPIRED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Initial state: reservation is held, buyer must upload payment proof.
    WaitingForPayment,

    /// Proof uploaded; awaiting the organizer's decision.
    WaitingForConfirmation,

    /// Organizer accepted the proof. Terminal.
    Paid,

    /// Organizer rejected the proof; stock was restored. Terminal.
    Reject,

    /// The payment window elapsed; stock was restored. Terminal.
    Expired,
}

impl TransactionStatus {
    /// Returns true if no further transition is permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Paid | TransactionStatus::Reject | TransactionStatus::Expired
        )
    }

    /// Returns true while the reservation still holds stock.
    ///
    /// Paid transactions keep their stock committed; Reject and Expired have
    /// given it back.
    pub fn holds_stock(&self) -> bool {
        matches!(
            self,
            TransactionStatus::WaitingForPayment
                | TransactionStatus::WaitingForConfirmation
                | TransactionStatus::Paid
        )
    }

    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            TransactionStatus::WaitingForPayment => "WAITING_FOR_PAYMENT",
            TransactionStatus::WaitingForConfirmation => "WAITING_FOR_CONFIRMATION",
            TransactionStatus::Paid => "PAID",
            TransactionStatus::Reject => "REJECT",
            TransactionStatus::Expired => "EXPIRED",
        }
    }
}

/// An organizer's verdict on a payment proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Proof is valid; the purchase is complete.
    Accept,

    /// Proof is invalid; the reservation is compensated.
    Reject,
}

/// One requested line of a checkout cart, as submitted by the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The ticket type to reserve.
    pub ticket: TicketId,

    /// Units requested. Must be positive.
    pub quantity: u32,
}

/// One line of a transaction: a quantity of one ticket type at a price
/// snapshot.
///
/// Immutable after creation; read back during compensation to know how much
/// stock to restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The owning transaction.
    pub transaction: TransactionId,

    /// The reserved ticket type.
    pub ticket: TicketId,

    /// Units reserved. Always positive.
    pub quantity: u32,

    /// Price per unit at purchase time, decoupled from later price changes.
    pub unit_price: Money,
}

impl LineItem {
    /// The line's contribution to the transaction total. `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A durable transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Internal identifier. Never exposed to API clients.
    pub id: TransactionId,

    /// Public unguessable reference token.
    pub reference: TxnRef,

    /// The buyer who owns this transaction.
    pub buyer: UserId,

    /// Current lifecycle status.
    pub status: TransactionStatus,

    /// Authoritative total: the sum of quantity times unit-price snapshot
    /// over all line items.
    pub total: Money,

    /// Reference to the uploaded payment proof, once submitted.
    pub proof: Option<ProofUrl>,

    /// When the reservation was created.
    pub created_at: DateTime<Utc>,

    /// When the payment window closes and the expiry job fires.
    pub expires_at: DateTime<Utc>,

    /// The line items created atomically with this transaction.
    pub items: Vec<LineItem>,
}
