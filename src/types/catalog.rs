//! Catalog records: the inventory side of the marketplace.
//!
//! Catalog management itself (event CRUD, pricing, vouchers) is an external
//! concern; these records exist so the lifecycle engine has an authoritative
//! source for stock and price at reservation time.

use serde::{Deserialize, Serialize};

use super::ids::{EventId, TicketId};
use super::money::Money;

/// A ticket type: the unit of finite inventory.
///
/// `stock` is mutated only by the transaction lifecycle engine — decremented
/// at reservation, incremented by compensation (rejection or expiry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Identifier of this ticket type.
    pub id: TicketId,

    /// The event this ticket admits to.
    pub event: EventId,

    /// Price per unit, snapshotted onto line items at purchase time.
    pub unit_price: Money,

    /// Units currently available for reservation. Never negative.
    pub stock: u32,
}

impl Ticket {
    /// Creates a ticket with its full initial allotment available.
    pub fn new(id: TicketId, event: EventId, unit_price: Money, stock: u32) -> Self {
        Ticket {
            id,
            event,
            unit_price,
            stock,
        }
    }
}

/// Explicit query specification for catalog browsing.
///
/// Every filterable field is enumerated here; there is no dynamic
/// field-name-to-value mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TicketFilter {
    /// Restrict to tickets of one event.
    pub event: Option<EventId>,

    /// 1-based page number. Defaults to the first page.
    pub page: Option<u32>,

    /// Page size. Defaults to [`TicketFilter::DEFAULT_PER_PAGE`], capped at
    /// [`TicketFilter::MAX_PER_PAGE`].
    pub per_page: Option<u32>,
}

impl TicketFilter {
    /// Page size used when the caller does not specify one.
    pub const DEFAULT_PER_PAGE: u32 = 10;

    /// Upper bound on page size, applied regardless of what was requested.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Effective 1-based page number (zero is treated as one).
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size after defaulting and capping.
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    /// Number of records to skip for the effective page.
    pub fn offset(&self) -> usize {
        (self.page() as usize - 1) * self.per_page() as usize
    }
}

/// One page of catalog results plus paging metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketPage {
    /// The tickets on this page, ordered by identifier.
    pub data: Vec<Ticket>,

    /// The effective page number.
    pub page: u32,

    /// The effective page size.
    pub per_page: u32,

    /// Total matching tickets across all pages.
    pub total: usize,
}
