//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! TicketId where an EventId is expected) and make the code more
//! self-documenting. Internal numeric identifiers never leave the process;
//! the only handle exposed to API clients is the [`TxnRef`] token.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An event (concert, conference, ...) in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event/{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(n: u64) -> Self {
        EventId(n)
    }
}

/// A ticket type within an event — the unit of finite inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket/{}", self.0)
    }
}

impl From<u64> for TicketId {
    fn from(n: u64) -> Self {
        TicketId(n)
    }
}

/// An authenticated user (buyer or organizer).
///
/// Identity is established by an external collaborator; this process trusts
/// the identifier it is handed and performs no credential checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user/{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(n: u64) -> Self {
        UserId(n)
    }
}

/// Internal numeric identifier of a transaction row.
///
/// Never exposed outside the process; external callers only ever see the
/// [`TxnRef`] token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn/{}", self.0)
    }
}

impl From<u64> for TransactionId {
    fn from(n: u64) -> Self {
        TransactionId(n)
    }
}

/// The public, unguessable reference token of a transaction.
///
/// A version-4 random UUID. This is the only transaction handle exposed in
/// URLs and API responses, and it doubles as the deduplication key for
/// scheduled expiry jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnRef(Uuid);

impl TxnRef {
    /// Generates a fresh random reference.
    pub fn generate() -> Self {
        TxnRef(Uuid::new_v4())
    }

    /// Wraps an existing UUID (replay, tests).
    pub fn from_uuid(id: Uuid) -> Self {
        TxnRef(id)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TxnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string is not a valid transaction reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTxnRef;

impl fmt::Display for InvalidTxnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid transaction reference")
    }
}

impl std::error::Error for InvalidTxnRef {}

impl FromStr for TxnRef {
    type Err = InvalidTxnRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TxnRef).map_err(|_| InvalidTxnRef)
    }
}

/// Durable reference to an uploaded payment-proof asset.
///
/// Produced by the object-storage collaborator; the engine stores only this
/// reference, never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofUrl(pub String);

impl ProofUrl {
    pub fn new(s: impl Into<String>) -> Self {
        ProofUrl(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProofUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProofUrl {
    fn from(s: String) -> Self {
        ProofUrl(s)
    }
}
