//! Out-of-band buyer notifications.
//!
//! Delivery (email, push, ...) is an external collaborator; the engine hands
//! it a recipient and a template with parameters and moves on. Notification
//! is strictly best-effort — a delivery failure must never roll back or
//! delay a transaction, so the interface is fire-and-forget and
//! implementations swallow their own errors.

use chrono::{DateTime, Utc};

use crate::types::{Decision, Money, TxnRef, UserId};

/// A templated notification with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The reservation is held; the buyer must upload a payment proof before
    /// the deadline.
    PaymentWindowOpened {
        reference: TxnRef,
        total: Money,
        expires_at: DateTime<Utc>,
    },

    /// The proof was received and is awaiting the organizer.
    ProofReceived { reference: TxnRef },

    /// The organizer decided on the proof.
    OrderDecided {
        reference: TxnRef,
        decision: Decision,
    },

    /// The payment window elapsed; the reservation was released.
    ReservationExpired { reference: TxnRef },
}

impl Notification {
    /// Stable template name, as the delivery collaborator knows it.
    pub fn template(&self) -> &'static str {
        match self {
            Notification::PaymentWindowOpened { .. } => "upload-proof",
            Notification::ProofReceived { .. } => "proof-received",
            Notification::OrderDecided { .. } => "order-decided",
            Notification::ReservationExpired { .. } => "reservation-expired",
        }
    }

    /// The transaction this notification concerns.
    pub fn reference(&self) -> TxnRef {
        match self {
            Notification::PaymentWindowOpened { reference, .. }
            | Notification::ProofReceived { reference }
            | Notification::OrderDecided { reference, .. }
            | Notification::ReservationExpired { reference } => *reference,
        }
    }
}

/// The notification delivery boundary.
pub trait Notifier: Send + Sync {
    /// Queues a notification for the recipient. Must not block on delivery
    /// and must not fail the caller.
    fn notify(&self, recipient: UserId, notification: &Notification);
}

/// A notifier that emits structured log events instead of delivering.
///
/// Stands in for the real delivery collaborator in deployments without one
/// configured, and keeps the notification stream observable either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: UserId, notification: &Notification) {
        tracing::info!(
            recipient = %recipient,
            template = notification.template(),
            reference = %notification.reference(),
            "notification queued"
        );
    }
}
