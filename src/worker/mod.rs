//! The expiry worker: consumes scheduled expiry jobs.
//!
//! The worker re-validates transaction state before acting — by the time a
//! job fires, the buyer or organizer may already have moved the transaction
//! on, and the timeout losing that race is expected, not exceptional. Only a
//! transaction still waiting for payment is expired and compensated.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::notify::{Notification, Notifier};
use crate::store::{ExpireOutcome, MarketStore, StoreError};
use crate::types::{TransactionStatus, TxnRef};

/// How a delivered job was resolved. All three dispositions acknowledge the
/// job; none are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryDisposition {
    /// The transaction was expired and its stock restored.
    Expired,

    /// The buyer or organizer transitioned first; the job was a no-op.
    AlreadySettled(TransactionStatus),

    /// No transaction with this reference exists; the job was stale.
    Stale,
}

/// Whether a failed job should be redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    /// Safe to redeliver with backoff (storage write failed, for instance).
    Transient,

    /// Redelivery cannot help; surface and drop.
    Permanent,
}

/// A job delivery failure, categorized for the scheduler's retry decision.
#[derive(Debug, Error)]
#[error("expiry job failed ({kind:?}): {source}")]
pub struct ExpiryJobError {
    /// Retry category.
    pub kind: JobErrorKind,

    /// The underlying store failure.
    #[source]
    pub source: StoreError,
}

impl ExpiryJobError {
    /// Returns true if the scheduler should redeliver this job.
    pub fn is_retryable(&self) -> bool {
        self.kind == JobErrorKind::Transient
    }
}

/// Consumes expiry jobs against the shared store.
pub struct ExpiryWorker {
    store: Arc<MarketStore>,
    notifier: Arc<dyn Notifier>,
}

impl ExpiryWorker {
    /// Creates a worker over the shared store.
    pub fn new(store: Arc<MarketStore>, notifier: Arc<dyn Notifier>) -> Self {
        ExpiryWorker { store, notifier }
    }

    /// Handles one delivered expiry job.
    ///
    /// The status check and the compensation are one atomic store operation;
    /// this method only interprets the outcome and notifies the buyer on an
    /// actual expiry (best-effort).
    #[instrument(skip(self), fields(reference = %reference))]
    pub fn handle(&self, reference: &TxnRef) -> Result<ExpiryDisposition, ExpiryJobError> {
        match self.store.expire(reference) {
            Ok(ExpireOutcome::Expired(transaction)) => {
                info!(buyer = %transaction.buyer, "reservation expired, stock restored");
                self.notifier.notify(
                    transaction.buyer,
                    &Notification::ReservationExpired {
                        reference: *reference,
                    },
                );
                Ok(ExpiryDisposition::Expired)
            }
            Ok(ExpireOutcome::AlreadySettled(status)) => {
                debug!(status = status.name(), "expiry lost the race, no-op");
                Ok(ExpiryDisposition::AlreadySettled(status))
            }
            Ok(ExpireOutcome::NotFound) => {
                debug!("stale expiry job for unknown transaction");
                Ok(ExpiryDisposition::Stale)
            }
            Err(source) => Err(classify(source)),
        }
    }
}

/// Categorizes a store failure for the retry decision.
///
/// Only persistence failures are transient; anything else coming out of
/// `expire` indicates corruption and cannot be retried away.
fn classify(source: StoreError) -> ExpiryJobError {
    let kind = match &source {
        StoreError::Persistence(_) | StoreError::Snapshot(_) => JobErrorKind::Transient,
        _ => JobErrorKind::Permanent,
    };
    ExpiryJobError { kind, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::EventLogError;
    use crate::test_utils::{RecordingNotifier, seeded_store};
    use crate::types::{Decision, ProofUrl, UserId};
    use chrono::Duration;

    fn worker_with_notifier(
        store: Arc<MarketStore>,
    ) -> (ExpiryWorker, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let worker = ExpiryWorker::new(store, notifier.clone());
        (worker, notifier)
    }

    #[test]
    fn scenario_timeout_expires_and_restores() {
        let (_dir, store, ticket) = seeded_store(5);
        let txn = store
            .create_reservation(
                UserId(1),
                &[crate::types::OrderLine {
                    ticket: ticket.id,
                    quantity: 2,
                }],
                Duration::minutes(5),
            )
            .unwrap();

        let (worker, notifier) = worker_with_notifier(store.clone());
        let disposition = worker.handle(&txn.reference).unwrap();

        assert_eq!(disposition, ExpiryDisposition::Expired);
        assert_eq!(store.ticket(ticket.id).unwrap().stock, 5);
        assert_eq!(
            store.transaction(&txn.reference).unwrap().status,
            TransactionStatus::Expired
        );

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, UserId(1));
        assert!(matches!(
            sent[0].1,
            Notification::ReservationExpired { reference } if reference == txn.reference
        ));
    }

    #[test]
    fn settled_transaction_is_a_noop_without_notification() {
        let (_dir, store, ticket) = seeded_store(5);
        let txn = store
            .create_reservation(
                UserId(1),
                &[crate::types::OrderLine {
                    ticket: ticket.id,
                    quantity: 2,
                }],
                Duration::minutes(5),
            )
            .unwrap();
        store
            .attach_proof(&txn.reference, ProofUrl::new("file:///p"), UserId(1))
            .unwrap();
        store
            .apply_decision(&txn.reference, Decision::Accept)
            .unwrap();

        let (worker, notifier) = worker_with_notifier(store.clone());
        let disposition = worker.handle(&txn.reference).unwrap();

        assert_eq!(
            disposition,
            ExpiryDisposition::AlreadySettled(TransactionStatus::Paid)
        );
        // Stock stays committed and nobody is notified.
        assert_eq!(store.ticket(ticket.id).unwrap().stock, 3);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn unknown_reference_is_stale_not_an_error() {
        let (_dir, store, _ticket) = seeded_store(5);
        let (worker, notifier) = worker_with_notifier(store);

        let disposition = worker.handle(&TxnRef::generate()).unwrap();
        assert_eq!(disposition, ExpiryDisposition::Stale);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn persistence_failures_classify_as_transient() {
        let error = classify(StoreError::Persistence(EventLogError::Io(
            std::io::Error::other("disk detached"),
        )));
        assert_eq!(error.kind, JobErrorKind::Transient);
        assert!(error.is_retryable());

        let error = classify(StoreError::Corruption("bad replay".into()));
        assert_eq!(error.kind, JobErrorKind::Permanent);
        assert!(!error.is_retryable());
    }
}
