//! In-memory marketplace state and event application.
//!
//! `MarketState` is the materialized view of the event log: applying every
//! logged event to an empty state reproduces exactly the state the process
//! held when it wrote them. Live operations go through the same
//! [`MarketState::apply`] path as recovery replay, so the two can never
//! drift apart.

use std::collections::HashMap;

use thiserror::Error;

use crate::ledger::{self, LedgerError};
use crate::lifecycle::{LifecycleAction, TransitionError, next_status};
use crate::persistence::{LedgerEventPayload, MarketSnapshot};
use crate::types::{
    Decision, Ticket, TicketId, Transaction, TransactionId, TransactionStatus, TxnRef,
};

/// Errors from applying an event to state.
///
/// On the live path these never occur (operations validate before logging);
/// during replay they indicate a corrupted log.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The event references a transaction that does not exist.
    #[error("unknown transaction reference {reference}")]
    UnknownReference { reference: TxnRef },

    /// A ticket or transaction id collides with an existing record.
    #[error("duplicate record: {detail}")]
    Duplicate { detail: String },

    /// A stock mutation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A status transition was not legal.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// The complete in-memory marketplace state.
#[derive(Debug, Default)]
pub struct MarketState {
    /// The catalog, with live stock counts.
    pub tickets: HashMap<TicketId, Ticket>,

    /// Every transaction ever created, including terminal ones.
    pub transactions: HashMap<TransactionId, Transaction>,

    /// Index from public reference to internal id.
    by_ref: HashMap<TxnRef, TransactionId>,

    /// Next ticket id to assign.
    pub next_ticket_id: u64,

    /// Next transaction id to assign.
    pub next_transaction_id: u64,
}

impl MarketState {
    /// Creates an empty state.
    pub fn new() -> Self {
        MarketState {
            tickets: HashMap::new(),
            transactions: HashMap::new(),
            by_ref: HashMap::new(),
            next_ticket_id: 1,
            next_transaction_id: 1,
        }
    }

    /// Rebuilds state from a snapshot.
    pub fn from_snapshot(snapshot: MarketSnapshot) -> Self {
        let by_ref = snapshot
            .transactions
            .values()
            .map(|t| (t.reference, t.id))
            .collect();

        MarketState {
            tickets: snapshot.tickets,
            transactions: snapshot.transactions,
            by_ref,
            next_ticket_id: snapshot.next_ticket_id,
            next_transaction_id: snapshot.next_transaction_id,
        }
    }

    /// Captures the state into a snapshot taken at the given log position.
    pub fn to_snapshot(&self, log_position: u64, next_seq: u64) -> MarketSnapshot {
        MarketSnapshot {
            schema_version: crate::persistence::SCHEMA_VERSION,
            snapshot_at: chrono::Utc::now(),
            log_position,
            next_seq,
            next_transaction_id: self.next_transaction_id,
            next_ticket_id: self.next_ticket_id,
            tickets: self.tickets.clone(),
            transactions: self.transactions.clone(),
        }
    }

    /// Looks up a transaction by its public reference.
    pub fn transaction_by_ref(&self, reference: &TxnRef) -> Option<&Transaction> {
        self.by_ref
            .get(reference)
            .and_then(|id| self.transactions.get(id))
    }

    /// Applies one event to the state.
    ///
    /// This is the only place state is mutated. Each arm is transactional in
    /// the sense that preconditions are re-derived from the event itself, so
    /// replay enforces the same rules live operations did.
    pub fn apply(&mut self, payload: &LedgerEventPayload) -> Result<(), ApplyError> {
        match payload {
            LedgerEventPayload::TicketRegistered { ticket } => {
                if self.tickets.contains_key(&ticket.id) {
                    return Err(ApplyError::Duplicate {
                        detail: format!("{} already registered", ticket.id),
                    });
                }
                self.tickets.insert(ticket.id, ticket.clone());
                self.next_ticket_id = self.next_ticket_id.max(ticket.id.0 + 1);
                Ok(())
            }

            LedgerEventPayload::TransactionCreated { transaction } => {
                if self.transactions.contains_key(&transaction.id)
                    || self.by_ref.contains_key(&transaction.reference)
                {
                    return Err(ApplyError::Duplicate {
                        detail: format!("{} already created", transaction.id),
                    });
                }

                let lines: Vec<(TicketId, u32)> = transaction
                    .items
                    .iter()
                    .map(|item| (item.ticket, item.quantity))
                    .collect();
                ledger::reserve_all(&mut self.tickets, &lines)?;

                self.by_ref.insert(transaction.reference, transaction.id);
                self.transactions.insert(transaction.id, transaction.clone());
                self.next_transaction_id = self.next_transaction_id.max(transaction.id.0 + 1);
                Ok(())
            }

            LedgerEventPayload::ProofAttached { reference, proof } => {
                let transaction = self.transaction_mut(reference)?;
                let next = next_status(transaction.status, LifecycleAction::SubmitProof)?;
                transaction.status = next;
                transaction.proof = Some(proof.clone());
                Ok(())
            }

            LedgerEventPayload::DecisionRecorded {
                reference,
                decision,
            } => {
                // End the transaction borrow before touching the stock table.
                let lines = {
                    let transaction = self.transaction_mut(reference)?;
                    let next =
                        next_status(transaction.status, LifecycleAction::Decide(*decision))?;
                    transaction.status = next;
                    transaction
                        .items
                        .iter()
                        .map(|item| (item.ticket, item.quantity))
                        .collect::<Vec<(TicketId, u32)>>()
                };

                if *decision == Decision::Reject {
                    ledger::restore_all(&mut self.tickets, &lines)?;
                }
                Ok(())
            }

            LedgerEventPayload::TransactionExpired { reference } => {
                let lines = {
                    let transaction = self.transaction_mut(reference)?;
                    let next = next_status(transaction.status, LifecycleAction::Expire)?;
                    transaction.status = next;
                    transaction
                        .items
                        .iter()
                        .map(|item| (item.ticket, item.quantity))
                        .collect::<Vec<(TicketId, u32)>>()
                };

                ledger::restore_all(&mut self.tickets, &lines)?;
                Ok(())
            }
        }
    }

    /// The explicit conditional-update guard: would `action` be accepted for
    /// the transaction's current status?
    ///
    /// Callers use this to distinguish "lost the race" from "never existed"
    /// before constructing an event.
    pub fn check_transition(
        &self,
        reference: &TxnRef,
        action: LifecycleAction,
    ) -> Option<Result<TransactionStatus, TransitionError>> {
        self.transaction_by_ref(reference)
            .map(|t| next_status(t.status, action))
    }

    fn transaction_mut(&mut self, reference: &TxnRef) -> Result<&mut Transaction, ApplyError> {
        let id = self
            .by_ref
            .get(reference)
            .copied()
            .ok_or(ApplyError::UnknownReference {
                reference: *reference,
            })?;
        self.transactions
            .get_mut(&id)
            .ok_or(ApplyError::UnknownReference {
                reference: *reference,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, LineItem, Money, ProofUrl, UserId};
    use chrono::Utc;

    fn state_with_ticket(stock: u32) -> MarketState {
        let mut state = MarketState::new();
        state
            .apply(&LedgerEventPayload::TicketRegistered {
                ticket: Ticket::new(TicketId(1), EventId(1), Money(10_000), stock),
            })
            .unwrap();
        state
    }

    fn created_event(reference: TxnRef, quantity: u32) -> LedgerEventPayload {
        LedgerEventPayload::TransactionCreated {
            transaction: Transaction {
                id: TransactionId(1),
                reference,
                buyer: UserId(5),
                status: TransactionStatus::WaitingForPayment,
                total: Money(10_000 * u64::from(quantity)),
                proof: None,
                created_at: Utc::now(),
                expires_at: Utc::now(),
                items: vec![LineItem {
                    transaction: TransactionId(1),
                    ticket: TicketId(1),
                    quantity,
                    unit_price: Money(10_000),
                }],
            },
        }
    }

    #[test]
    fn created_event_reserves_stock_and_indexes_reference() {
        let mut state = state_with_ticket(5);
        let reference = TxnRef::generate();

        state.apply(&created_event(reference, 3)).unwrap();

        assert_eq!(state.tickets[&TicketId(1)].stock, 2);
        assert_eq!(
            state.transaction_by_ref(&reference).unwrap().status,
            TransactionStatus::WaitingForPayment
        );
        assert_eq!(state.next_transaction_id, 2);
    }

    #[test]
    fn created_event_over_stock_is_rejected() {
        let mut state = state_with_ticket(2);
        let err = state.apply(&created_event(TxnRef::generate(), 3)).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Ledger(LedgerError::InsufficientStock { .. })
        ));
        assert_eq!(state.tickets[&TicketId(1)].stock, 2);
    }

    #[test]
    fn reject_restores_stock_but_accept_keeps_it_committed() {
        for (decision, expected_stock, expected_status) in [
            (Decision::Reject, 5, TransactionStatus::Reject),
            (Decision::Accept, 2, TransactionStatus::Paid),
        ] {
            let mut state = state_with_ticket(5);
            let reference = TxnRef::generate();
            state.apply(&created_event(reference, 3)).unwrap();
            state
                .apply(&LedgerEventPayload::ProofAttached {
                    reference,
                    proof: ProofUrl::new("file:///p"),
                })
                .unwrap();
            state
                .apply(&LedgerEventPayload::DecisionRecorded {
                    reference,
                    decision,
                })
                .unwrap();

            assert_eq!(state.tickets[&TicketId(1)].stock, expected_stock);
            assert_eq!(
                state.transaction_by_ref(&reference).unwrap().status,
                expected_status
            );
        }
    }

    #[test]
    fn expiry_after_proof_is_an_invalid_transition() {
        let mut state = state_with_ticket(5);
        let reference = TxnRef::generate();
        state.apply(&created_event(reference, 3)).unwrap();
        state
            .apply(&LedgerEventPayload::ProofAttached {
                reference,
                proof: ProofUrl::new("file:///p"),
            })
            .unwrap();

        let err = state
            .apply(&LedgerEventPayload::TransactionExpired { reference })
            .unwrap_err();
        assert!(matches!(err, ApplyError::Transition(_)));

        // Stock untouched by the failed expiry.
        assert_eq!(state.tickets[&TicketId(1)].stock, 2);
    }

    #[test]
    fn expiry_restores_stock_exactly_once() {
        let mut state = state_with_ticket(5);
        let reference = TxnRef::generate();
        state.apply(&created_event(reference, 3)).unwrap();

        state
            .apply(&LedgerEventPayload::TransactionExpired { reference })
            .unwrap();
        assert_eq!(state.tickets[&TicketId(1)].stock, 5);

        // A second expiry is an invalid transition, not a double restore.
        assert!(
            state
                .apply(&LedgerEventPayload::TransactionExpired { reference })
                .is_err()
        );
        assert_eq!(state.tickets[&TicketId(1)].stock, 5);
    }

    #[test]
    fn snapshot_roundtrip_preserves_reference_index() {
        let mut state = state_with_ticket(5);
        let reference = TxnRef::generate();
        state.apply(&created_event(reference, 2)).unwrap();

        let snapshot = state.to_snapshot(0, 0);
        let restored = MarketState::from_snapshot(snapshot);

        assert!(restored.transaction_by_ref(&reference).is_some());
        assert_eq!(restored.next_transaction_id, state.next_transaction_id);
        assert_eq!(restored.next_ticket_id, state.next_ticket_id);
        assert_eq!(restored.tickets[&TicketId(1)].stock, 3);
    }

    #[test]
    fn check_transition_distinguishes_missing_from_settled() {
        let mut state = state_with_ticket(5);
        let reference = TxnRef::generate();

        assert!(
            state
                .check_transition(&reference, LifecycleAction::Expire)
                .is_none()
        );

        state.apply(&created_event(reference, 1)).unwrap();
        assert_eq!(
            state.check_transition(&reference, LifecycleAction::Expire),
            Some(Ok(TransactionStatus::Expired))
        );

        state
            .apply(&LedgerEventPayload::TransactionExpired { reference })
            .unwrap();
        assert!(matches!(
            state.check_transition(&reference, LifecycleAction::Expire),
            Some(Err(_))
        ));
    }
}
