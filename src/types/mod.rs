//! Core domain types for the ticketing marketplace.
//!
//! This module contains all the fundamental types used throughout the
//! application, designed to encode invariants via the type system.

pub mod catalog;
pub mod ids;
pub mod money;
pub mod transaction;

// Re-export commonly used types at the module level
pub use catalog::{Ticket, TicketFilter, TicketPage};
pub use ids::{
    EventId, InvalidTxnRef, ProofUrl, TicketId, TransactionId, TxnRef, UserId,
};
pub use money::Money;
pub use transaction::{Decision, LineItem, OrderLine, Transaction, TransactionStatus};
