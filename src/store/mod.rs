//! The durable transaction store.
//!
//! `MarketStore` is the single shared store behind every request handler and
//! the expiry worker. All mutation happens inside one critical section:
//! validate, append the event to the log (fsync for lifecycle events), then
//! apply it to in-memory state. Because validation, the write-ahead append,
//! and the application are covered by the same lock, every operation is a
//! single atomic conditional update — the multi-row reservation either
//! commits completely or not at all, and status transitions are
//! compare-and-set.
//!
//! # Recovery
//!
//! `open` loads the latest snapshot, replays the log suffix through the same
//! `MarketState::apply` path used live, and resumes appending. A crash
//! between the append and the in-memory application cannot be observed: the
//! lock was held, so nothing read the intermediate state, and the next start
//! replays the appended event.

mod state;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::lifecycle::{LifecycleAction, TransitionError};
use crate::persistence::{
    EventLog, EventLogError, LedgerEventPayload, SnapshotError, save_snapshot_atomic,
    try_load_snapshot,
};
use crate::types::{
    Decision, EventId, LineItem, Money, OrderLine, ProofUrl, Ticket, TicketFilter, TicketId,
    TicketPage, Transaction, TransactionId, TransactionStatus, TxnRef, UserId,
};

pub use state::{ApplyError, MarketState};

/// Snapshot filename inside the data directory.
const SNAPSHOT_FILE: &str = "snapshot.json";

/// Event log filename inside the data directory.
const LOG_FILE: &str = "ledger.log";

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order contained no lines.
    #[error("order contains no items")]
    EmptyOrder,

    /// An order line requested zero units.
    #[error("order line for {ticket} requests zero units")]
    ZeroQuantity { ticket: TicketId },

    /// A referenced ticket does not exist.
    #[error("ticket {ticket} not found")]
    TicketNotFound { ticket: TicketId },

    /// Requested quantity exceeds available stock.
    #[error("insufficient stock for {ticket}: requested {requested}, available {available}")]
    InsufficientStock {
        ticket: TicketId,
        requested: u32,
        available: u32,
    },

    /// The order total does not fit in the money type.
    #[error("order total overflows")]
    AmountOverflow,

    /// No transaction with this reference exists.
    #[error("transaction {reference} not found")]
    TransactionNotFound { reference: TxnRef },

    /// The requester does not own the transaction.
    #[error("user {requester} does not own transaction {reference}")]
    Forbidden { requester: UserId, reference: TxnRef },

    /// The requested transition is not legal from the current status.
    #[error("transaction {reference}: {source}")]
    InvalidState {
        reference: TxnRef,
        #[source]
        source: TransitionError,
    },

    /// The event log or snapshot could not be written or read. Retryable.
    #[error("persistence failure: {0}")]
    Persistence(#[from] EventLogError),

    /// Snapshot load/save failure during open or checkpoint.
    #[error("snapshot failure: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The log replayed into an impossible state, or a validated operation
    /// failed to apply. Requires manual intervention.
    #[error("ledger corruption: {0}")]
    Corruption(String),
}

/// Result of asking the store to expire a transaction.
///
/// Losing the race against the buyer or organizer is expected for the expiry
/// path, so it is an outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// The transaction was still unpaid: it is now `EXPIRED` and its stock
    /// has been restored.
    Expired(Transaction),

    /// Someone else transitioned first; nothing was changed.
    AlreadySettled(TransactionStatus),

    /// No such transaction. The job was stale.
    NotFound,
}

struct StoreInner {
    state: MarketState,
    log: EventLog,
}

/// The shared, durable marketplace store.
pub struct MarketStore {
    inner: Mutex<StoreInner>,
    snapshot_path: PathBuf,
}

impl MarketStore {
    /// Opens the store rooted at `data_dir`, recovering state from the
    /// snapshot and event log if present.
    #[instrument(skip_all, fields(data_dir = %data_dir.as_ref().display()))]
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(EventLogError::from)?;

        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let log_path = data_dir.join(LOG_FILE);

        let (mut state, log_position, snapshot_seq) =
            match try_load_snapshot(&snapshot_path)? {
                Some(snapshot) => {
                    debug!(
                        log_position = snapshot.log_position,
                        transactions = snapshot.transactions.len(),
                        "loaded snapshot"
                    );
                    let position = snapshot.log_position;
                    let next_seq = snapshot.next_seq;
                    (MarketState::from_snapshot(snapshot), position, next_seq)
                }
                None => {
                    debug!("no snapshot found, starting empty");
                    (MarketState::new(), 0, 0)
                }
            };

        let (events, replayed_seq) = EventLog::replay_from(&log_path, log_position)?;
        let replayed = events.len();
        for event in events {
            state.apply(&event.payload).map_err(|e| {
                StoreError::Corruption(format!("replaying event {}: {}", event.seq, e))
            })?;
        }

        let next_seq = replayed_seq.max(snapshot_seq);
        let log = EventLog::open_with_seq(&log_path, next_seq).map_err(EventLogError::from)?;

        info!(
            replayed,
            next_seq,
            tickets = state.tickets.len(),
            transactions = state.transactions.len(),
            "store opened"
        );

        Ok(MarketStore {
            inner: Mutex::new(StoreInner { state, log }),
            snapshot_path,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoning panic cannot have left a half-applied operation behind:
        // events are appended before application, and application either
        // completes or leaves an error we would have surfaced. Continue.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a validated event and applies it, under an already-held lock.
    ///
    /// Validation must have happened under the same lock; an application
    /// failure after a successful append is therefore corruption, not a
    /// user error.
    fn commit(inner: &mut StoreInner, payload: LedgerEventPayload) -> Result<(), StoreError> {
        inner.log.append(payload.clone())?;
        inner
            .state
            .apply(&payload)
            .map_err(|e| StoreError::Corruption(format!("applying {}: {}", payload.name(), e)))
    }

    // ─── Catalog ───

    /// Registers a new ticket type with its initial allotment.
    ///
    /// Catalog writes are batched (no per-event fsync); call
    /// [`MarketStore::sync`] after seeding.
    pub fn register_ticket(
        &self,
        event: EventId,
        unit_price: Money,
        stock: u32,
    ) -> Result<Ticket, StoreError> {
        let mut inner = self.lock();
        let ticket = Ticket::new(
            TicketId(inner.state.next_ticket_id),
            event,
            unit_price,
            stock,
        );
        Self::commit(
            &mut inner,
            LedgerEventPayload::TicketRegistered {
                ticket: ticket.clone(),
            },
        )?;
        Ok(ticket)
    }

    /// Forces an fsync of the event log.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.lock().log.sync().map_err(EventLogError::from)?;
        Ok(())
    }

    /// Looks up one ticket.
    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.lock().state.tickets.get(&id).cloned()
    }

    /// Lists catalog tickets matching the filter, ordered by id.
    pub fn list_tickets(&self, filter: &TicketFilter) -> TicketPage {
        let inner = self.lock();
        let mut matching: Vec<Ticket> = inner
            .state
            .tickets
            .values()
            .filter(|t| filter.event.is_none_or(|event| t.event == event))
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.id);

        let total = matching.len();
        let data: Vec<Ticket> = matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.per_page() as usize)
            .collect();

        TicketPage {
            data,
            page: filter.page(),
            per_page: filter.per_page(),
            total,
        }
    }

    // ─── Transaction lifecycle ───

    /// Creates a reservation: the transaction, its line items with price
    /// snapshots, and the matching stock decrements, as one atomic unit.
    ///
    /// Validation order follows the API contract: empty order, zero
    /// quantities, unknown tickets, then stock. The stock pre-check and the
    /// decrement run under the same lock, so the pre-check is authoritative —
    /// a concurrent reservation cannot invalidate it.
    #[instrument(skip(self, items), fields(buyer = %buyer, lines = items.len()))]
    pub fn create_reservation(
        &self,
        buyer: UserId,
        items: &[OrderLine],
        payment_window: Duration,
    ) -> Result<Transaction, StoreError> {
        if items.is_empty() {
            return Err(StoreError::EmptyOrder);
        }
        for line in items {
            if line.quantity == 0 {
                return Err(StoreError::ZeroQuantity {
                    ticket: line.ticket,
                });
            }
        }

        let mut inner = self.lock();

        // Resolve price snapshots and check availability per ticket,
        // accumulating demand so duplicate lines count together.
        let mut demand: std::collections::HashMap<TicketId, u32> = std::collections::HashMap::new();
        for line in items {
            let entry = demand.entry(line.ticket).or_insert(0);
            *entry = entry.saturating_add(line.quantity);
        }
        for (&ticket_id, &requested) in &demand {
            let ticket = inner
                .state
                .tickets
                .get(&ticket_id)
                .ok_or(StoreError::TicketNotFound { ticket: ticket_id })?;
            if ticket.stock < requested {
                return Err(StoreError::InsufficientStock {
                    ticket: ticket_id,
                    requested,
                    available: ticket.stock,
                });
            }
        }

        let id = TransactionId(inner.state.next_transaction_id);
        let mut total = Money::ZERO;
        let mut line_items = Vec::with_capacity(items.len());
        for line in items {
            // Presence was just checked above.
            let unit_price = inner
                .state
                .tickets
                .get(&line.ticket)
                .map(|t| t.unit_price)
                .ok_or(StoreError::TicketNotFound {
                    ticket: line.ticket,
                })?;
            let item = LineItem {
                transaction: id,
                ticket: line.ticket,
                quantity: line.quantity,
                unit_price,
            };
            let line_total = item.line_total().ok_or(StoreError::AmountOverflow)?;
            total = total
                .checked_add(line_total)
                .ok_or(StoreError::AmountOverflow)?;
            line_items.push(item);
        }

        let created_at = Utc::now();
        let transaction = Transaction {
            id,
            reference: TxnRef::generate(),
            buyer,
            status: TransactionStatus::WaitingForPayment,
            total,
            proof: None,
            created_at,
            expires_at: created_at + payment_window,
            items: line_items,
        };

        Self::commit(
            &mut inner,
            LedgerEventPayload::TransactionCreated {
                transaction: transaction.clone(),
            },
        )?;

        debug!(reference = %transaction.reference, total = %transaction.total, "reservation committed");
        Ok(transaction)
    }

    /// Looks up a transaction by its public reference.
    pub fn transaction(&self, reference: &TxnRef) -> Option<Transaction> {
        self.lock().state.transaction_by_ref(reference).cloned()
    }

    /// Attaches a payment proof and moves the transaction to
    /// `WAITING_FOR_CONFIRMATION`.
    ///
    /// Only the owning buyer may submit; resubmission is accepted only while
    /// the transaction is still `WAITING_FOR_PAYMENT`.
    pub fn attach_proof(
        &self,
        reference: &TxnRef,
        proof: ProofUrl,
        requester: UserId,
    ) -> Result<Transaction, StoreError> {
        let mut inner = self.lock();

        let transaction = inner
            .state
            .transaction_by_ref(reference)
            .ok_or(StoreError::TransactionNotFound {
                reference: *reference,
            })?;

        if transaction.buyer != requester {
            return Err(StoreError::Forbidden {
                requester,
                reference: *reference,
            });
        }

        if let Some(Err(source)) =
            inner
                .state
                .check_transition(reference, LifecycleAction::SubmitProof)
        {
            return Err(StoreError::InvalidState {
                reference: *reference,
                source,
            });
        }

        Self::commit(
            &mut inner,
            LedgerEventPayload::ProofAttached {
                reference: *reference,
                proof,
            },
        )?;

        self.cloned_by_ref(&inner, reference)
    }

    /// Applies the organizer's decision.
    ///
    /// Accept commits the stock for good; reject restores every line item's
    /// quantity atomically with the status change.
    pub fn apply_decision(
        &self,
        reference: &TxnRef,
        decision: Decision,
    ) -> Result<Transaction, StoreError> {
        let mut inner = self.lock();

        match inner
            .state
            .check_transition(reference, LifecycleAction::Decide(decision))
        {
            None => {
                return Err(StoreError::TransactionNotFound {
                    reference: *reference,
                });
            }
            Some(Err(source)) => {
                return Err(StoreError::InvalidState {
                    reference: *reference,
                    source,
                });
            }
            Some(Ok(_)) => {}
        }

        Self::commit(
            &mut inner,
            LedgerEventPayload::DecisionRecorded {
                reference: *reference,
                decision,
            },
        )?;

        self.cloned_by_ref(&inner, reference)
    }

    /// Expires a transaction if — and only if — it is still waiting for
    /// payment.
    ///
    /// The status check and the compensation are one atomic unit; racing
    /// against a concurrent proof submission or decision, exactly one side
    /// takes effect.
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn expire(&self, reference: &TxnRef) -> Result<ExpireOutcome, StoreError> {
        let mut inner = self.lock();

        match inner.state.check_transition(reference, LifecycleAction::Expire) {
            None => return Ok(ExpireOutcome::NotFound),
            Some(Err(error)) => return Ok(ExpireOutcome::AlreadySettled(error.from)),
            Some(Ok(_)) => {}
        }

        Self::commit(
            &mut inner,
            LedgerEventPayload::TransactionExpired {
                reference: *reference,
            },
        )?;

        let transaction = self.cloned_by_ref(&inner, reference)?;
        debug!(status = transaction.status.name(), "transaction expired");
        Ok(ExpireOutcome::Expired(transaction))
    }

    /// References and deadlines of every transaction still waiting for
    /// payment. Used to re-arm expiry jobs after a restart.
    pub fn pending_payment(&self) -> Vec<(TxnRef, DateTime<Utc>)> {
        self.lock()
            .state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::WaitingForPayment)
            .map(|t| (t.reference, t.expires_at))
            .collect()
    }

    /// Writes a snapshot of the current state, bounding future recovery
    /// replay.
    pub fn save_snapshot(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let position = inner.log.position().map_err(EventLogError::from)?;
        let next_seq = inner.log.next_seq();
        let snapshot = inner.state.to_snapshot(position, next_seq);
        save_snapshot_atomic(&self.snapshot_path, &snapshot)?;
        info!(log_position = position, "snapshot saved");
        Ok(())
    }

    fn cloned_by_ref(
        &self,
        inner: &StoreInner,
        reference: &TxnRef,
    ) -> Result<Transaction, StoreError> {
        inner
            .state
            .transaction_by_ref(reference)
            .cloned()
            .ok_or(StoreError::TransactionNotFound {
                reference: *reference,
            })
    }
}
