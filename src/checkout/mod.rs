//! The checkout orchestrator: the public face of the lifecycle engine.
//!
//! Coordinates the store, the expiry scheduler, proof storage, and the
//! notifier. Every method is synchronous request/response; the only
//! asynchronous effect is the expiry job armed at reservation time.
//!
//! API responses never carry internal numeric identifiers — callers are
//! handed the unguessable reference token and nothing else.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::notify::{Notification, Notifier};
use crate::proofs::{ProofStorage, ProofStorageError};
use crate::sched::ExpiryScheduler;
use crate::store::{MarketStore, StoreError};
use crate::types::{
    Decision, Money, OrderLine, ProofUrl, TicketId, Transaction, TransactionStatus, TxnRef, UserId,
};

/// Errors surfaced by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The uploaded proof was empty.
    #[error("payment proof is empty")]
    EmptyProof,

    /// The proof asset could not be stored.
    #[error("proof storage failure: {0}")]
    ProofStorage(#[from] ProofStorageError),

    /// A store-level failure (validation, state, or persistence).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The synchronous answer to a lifecycle call.
///
/// Carries only what an untrusted caller may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    /// The public reference token.
    pub reference: TxnRef,

    /// Status after the call.
    pub status: TransactionStatus,

    /// The authoritative total, summed over line items.
    pub total: Money,

    /// When the payment window closes.
    pub expires_at: DateTime<Utc>,
}

impl From<&Transaction> for Confirmation {
    fn from(t: &Transaction) -> Self {
        Confirmation {
            reference: t.reference,
            status: t.status,
            total: t.total,
            expires_at: t.expires_at,
        }
    }
}

/// One line of a transaction as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewItem {
    pub ticket: TicketId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// The pollable read view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub reference: TxnRef,
    pub status: TransactionStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub proof: Option<ProofUrl>,
    pub items: Vec<ViewItem>,
}

impl From<&Transaction> for TransactionView {
    fn from(t: &Transaction) -> Self {
        TransactionView {
            reference: t.reference,
            status: t.status,
            total: t.total,
            created_at: t.created_at,
            expires_at: t.expires_at,
            proof: t.proof.clone(),
            items: t
                .items
                .iter()
                .map(|item| ViewItem {
                    ticket: item.ticket,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

/// The checkout orchestrator.
pub struct Checkout {
    store: Arc<MarketStore>,
    scheduler: Arc<dyn ExpiryScheduler>,
    proofs: Arc<dyn ProofStorage>,
    notifier: Arc<dyn Notifier>,
    payment_window: Duration,
}

impl Checkout {
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        store: Arc<MarketStore>,
        scheduler: Arc<dyn ExpiryScheduler>,
        proofs: Arc<dyn ProofStorage>,
        notifier: Arc<dyn Notifier>,
        payment_window: Duration,
    ) -> Self {
        Checkout {
            store,
            scheduler,
            proofs,
            notifier,
            payment_window,
        }
    }

    fn window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.payment_window)
            .unwrap_or_else(|_| chrono::Duration::days(365))
    }

    /// Creates a reservation from the buyer's cart.
    ///
    /// On success the reservation is durable, the expiry job is armed
    /// (deduplicated by reference), and the buyer is notified of the upload
    /// deadline — notification being best-effort, never a rollback cause.
    #[instrument(skip(self, items), fields(buyer = %buyer))]
    pub fn create_transaction(
        &self,
        buyer: UserId,
        items: &[OrderLine],
    ) -> Result<Confirmation, CheckoutError> {
        let transaction = self
            .store
            .create_reservation(buyer, items, self.window())?;

        if !self
            .scheduler
            .schedule_at(transaction.reference, transaction.expires_at)
        {
            // A fresh reference can only collide if a previous schedule for
            // it is still pending, which dedup is exactly meant to absorb.
            debug!(reference = %transaction.reference, "expiry already scheduled");
        }

        self.notifier.notify(
            buyer,
            &Notification::PaymentWindowOpened {
                reference: transaction.reference,
                total: transaction.total,
                expires_at: transaction.expires_at,
            },
        );

        info!(reference = %transaction.reference, total = %transaction.total, "transaction created");
        Ok(Confirmation::from(&transaction))
    }

    /// Accepts the buyer's payment-proof upload.
    ///
    /// Ownership is checked before the asset is stored; the status
    /// transition is re-validated atomically by the store, so a concurrent
    /// expiry beats this call cleanly.
    #[instrument(skip(self, bytes), fields(reference = %reference, requester = %requester))]
    pub fn submit_payment_proof(
        &self,
        reference: &TxnRef,
        bytes: &[u8],
        requester: UserId,
    ) -> Result<Confirmation, CheckoutError> {
        if bytes.is_empty() {
            return Err(CheckoutError::EmptyProof);
        }

        let transaction =
            self.store
                .transaction(reference)
                .ok_or(StoreError::TransactionNotFound {
                    reference: *reference,
                })?;
        if transaction.buyer != requester {
            return Err(StoreError::Forbidden {
                requester,
                reference: *reference,
            }
            .into());
        }

        let proof = self.proofs.store(*reference, bytes)?;
        let updated = self.store.attach_proof(reference, proof, requester)?;

        self.notifier.notify(
            requester,
            &Notification::ProofReceived {
                reference: *reference,
            },
        );

        Ok(Confirmation::from(&updated))
    }

    /// Applies the organizer's decision (authorization is the caller's
    /// concern).
    #[instrument(skip(self), fields(reference = %reference, ?decision))]
    pub fn decide(
        &self,
        reference: &TxnRef,
        decision: Decision,
    ) -> Result<Confirmation, CheckoutError> {
        let updated = self.store.apply_decision(reference, decision)?;

        self.notifier.notify(
            updated.buyer,
            &Notification::OrderDecided {
                reference: *reference,
                decision,
            },
        );

        info!(status = updated.status.name(), "decision applied");
        Ok(Confirmation::from(&updated))
    }

    /// The pollable view of one transaction.
    pub fn transaction(&self, reference: &TxnRef) -> Option<TransactionView> {
        self.store
            .transaction(reference)
            .as_ref()
            .map(TransactionView::from)
    }

    /// Re-arms expiry jobs for every transaction still waiting for payment.
    ///
    /// Called once at startup: the delay queue lives in memory, so a restart
    /// would otherwise orphan in-flight reservations. Deadlines already in
    /// the past fire immediately.
    pub fn resume_pending(&self) -> usize {
        let pending = self.store.pending_payment();
        let count = pending.len();
        for (reference, expires_at) in pending {
            if !self.scheduler.schedule_at(reference, expires_at) {
                warn!(reference = %reference, "expiry job unexpectedly already pending at startup");
            }
        }
        if count > 0 {
            info!(count, "re-armed expiry jobs for unpaid transactions");
        }
        count
    }
}
