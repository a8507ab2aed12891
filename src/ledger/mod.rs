//! Stock arithmetic for the inventory ledger.
//!
//! These functions are pure mutations of the in-memory stock table and are
//! only ever invoked inside the store's critical section, which is what makes
//! a reserve a single atomic conditional update rather than a read-then-write
//! across two round trips.
//!
//! Compensation (`restore_all`) is invoked at most once per committed
//! reservation: the two compensating paths (rejection and expiry) are
//! mutually exclusive exits of the status state machine.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{Ticket, TicketId};

/// Errors from stock mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ticket is not in the catalog.
    #[error("ticket {ticket} not found")]
    UnknownTicket { ticket: TicketId },

    /// The requested quantity exceeds what is available.
    #[error("insufficient stock for {ticket}: requested {requested}, available {available}")]
    InsufficientStock {
        ticket: TicketId,
        requested: u32,
        available: u32,
    },

    /// Restoring would overflow the stock counter. Indicates corrupted
    /// accounting, since stock can never exceed the original allotment.
    #[error("stock overflow for {ticket}")]
    StockOverflow { ticket: TicketId },
}

/// Reserves `quantity` units of one ticket: checks availability and
/// decrements in the same step.
///
/// Fails with [`LedgerError::InsufficientStock`] without mutating anything
/// if fewer than `quantity` units are available.
pub fn reserve(
    tickets: &mut HashMap<TicketId, Ticket>,
    ticket: TicketId,
    quantity: u32,
) -> Result<(), LedgerError> {
    let record = tickets
        .get_mut(&ticket)
        .ok_or(LedgerError::UnknownTicket { ticket })?;

    if record.stock < quantity {
        return Err(LedgerError::InsufficientStock {
            ticket,
            requested: quantity,
            available: record.stock,
        });
    }

    record.stock -= quantity;
    Ok(())
}

/// Restores `quantity` units of one ticket.
pub fn restore(
    tickets: &mut HashMap<TicketId, Ticket>,
    ticket: TicketId,
    quantity: u32,
) -> Result<(), LedgerError> {
    let record = tickets
        .get_mut(&ticket)
        .ok_or(LedgerError::UnknownTicket { ticket })?;

    record.stock = record
        .stock
        .checked_add(quantity)
        .ok_or(LedgerError::StockOverflow { ticket })?;
    Ok(())
}

/// Reserves every `(ticket, quantity)` pair, or nothing.
///
/// All availability checks run before any decrement, so a failure on the
/// third line of an order leaves the first two untouched — no partial
/// reservation. Duplicate ticket ids within one order are handled correctly
/// because the checks accumulate per-ticket demand.
pub fn reserve_all(
    tickets: &mut HashMap<TicketId, Ticket>,
    items: &[(TicketId, u32)],
) -> Result<(), LedgerError> {
    // Accumulate demand per ticket so duplicates can't sneak past the check.
    let mut demand: HashMap<TicketId, u32> = HashMap::new();
    for &(ticket, quantity) in items {
        let entry = demand.entry(ticket).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    for (&ticket, &quantity) in &demand {
        let record = tickets
            .get(&ticket)
            .ok_or(LedgerError::UnknownTicket { ticket })?;
        if record.stock < quantity {
            return Err(LedgerError::InsufficientStock {
                ticket,
                requested: quantity,
                available: record.stock,
            });
        }
    }

    for (ticket, quantity) in demand {
        reserve(tickets, ticket, quantity)?;
    }
    Ok(())
}

/// Restores every `(ticket, quantity)` pair.
pub fn restore_all(
    tickets: &mut HashMap<TicketId, Ticket>,
    items: &[(TicketId, u32)],
) -> Result<(), LedgerError> {
    for &(ticket, quantity) in items {
        restore(tickets, ticket, quantity)?;
    }
    Ok(())
}
