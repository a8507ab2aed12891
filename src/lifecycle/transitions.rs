//! Status transitions for the transaction state machine.
//!
//! Pure functions for computing the next status based on the current status
//! and the action being applied. The store enforces these transitions under
//! its lock; three independent actors (buyer, organizer, expiry worker) can
//! race to transition the same transaction, and whoever applies first wins.

use crate::types::{Decision, TransactionStatus};

/// An action that attempts to move a transaction to its next status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// The buyer submitted a payment proof.
    SubmitProof,

    /// The organizer accepted or rejected the proof.
    Decide(Decision),

    /// The payment window elapsed without a proof.
    Expire,
}

impl LifecycleAction {
    /// Stable name for logging and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleAction::SubmitProof => "submit_proof",
            LifecycleAction::Decide(Decision::Accept) => "accept",
            LifecycleAction::Decide(Decision::Reject) => "reject",
            LifecycleAction::Expire => "expire",
        }
    }
}

/// Error returned when a transition is not allowed from the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    /// The status the transaction was in.
    pub from: TransactionStatus,

    /// The action that was attempted.
    pub action: LifecycleAction,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot {} a transaction in status {}",
            self.action.name(),
            self.from.name()
        )
    }
}

impl std::error::Error for TransitionError {}

/// Computes the next status for an action applied to the current status.
///
/// The complete transition table:
///
/// - `WAITING_FOR_PAYMENT` + submit_proof → `WAITING_FOR_CONFIRMATION`
/// - `WAITING_FOR_CONFIRMATION` + accept → `PAID`
/// - `WAITING_FOR_CONFIRMATION` + reject → `REJECT`
/// - `WAITING_FOR_PAYMENT` + expire → `EXPIRED`
///
/// Every other combination is an error with no side effect. In particular,
/// no action leaves a terminal status, and an expiry racing against a proof
/// submission or a decision loses cleanly.
pub fn next_status(
    current: TransactionStatus,
    action: LifecycleAction,
) -> Result<TransactionStatus, TransitionError> {
    match (current, action) {
        (TransactionStatus::WaitingForPayment, LifecycleAction::SubmitProof) => {
            Ok(TransactionStatus::WaitingForConfirmation)
        }
        (TransactionStatus::WaitingForConfirmation, LifecycleAction::Decide(Decision::Accept)) => {
            Ok(TransactionStatus::Paid)
        }
        (TransactionStatus::WaitingForConfirmation, LifecycleAction::Decide(Decision::Reject)) => {
            Ok(TransactionStatus::Reject)
        }
        (TransactionStatus::WaitingForPayment, LifecycleAction::Expire) => {
            Ok(TransactionStatus::Expired)
        }
        (from, action) => Err(TransitionError { from, action }),
    }
}

/// Returns true if applying `action` would restore reserved stock.
///
/// Exactly the transitions into `REJECT` and `EXPIRED` compensate; because
/// those two are mutually exclusive exits guarded by the same status check,
/// each reservation is compensated at most once.
pub fn compensates(current: TransactionStatus, action: LifecycleAction) -> bool {
    matches!(
        next_status(current, action),
        Ok(TransactionStatus::Reject) | Ok(TransactionStatus::Expired)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATUSES: [TransactionStatus; 5] = [
        TransactionStatus::WaitingForPayment,
        TransactionStatus::WaitingForConfirmation,
        TransactionStatus::Paid,
        TransactionStatus::Reject,
        TransactionStatus::Expired,
    ];

    const ALL_ACTIONS: [LifecycleAction; 4] = [
        LifecycleAction::SubmitProof,
        LifecycleAction::Decide(Decision::Accept),
        LifecycleAction::Decide(Decision::Reject),
        LifecycleAction::Expire,
    ];

    fn arb_status() -> impl Strategy<Value = TransactionStatus> {
        proptest::sample::select(ALL_STATUSES.to_vec())
    }

    fn arb_action() -> impl Strategy<Value = LifecycleAction> {
        proptest::sample::select(ALL_ACTIONS.to_vec())
    }

    // ─── The four legal transitions ───

    #[test]
    fn proof_moves_to_waiting_for_confirmation() {
        assert_eq!(
            next_status(
                TransactionStatus::WaitingForPayment,
                LifecycleAction::SubmitProof
            ),
            Ok(TransactionStatus::WaitingForConfirmation)
        );
    }

    #[test]
    fn accept_moves_to_paid() {
        assert_eq!(
            next_status(
                TransactionStatus::WaitingForConfirmation,
                LifecycleAction::Decide(Decision::Accept)
            ),
            Ok(TransactionStatus::Paid)
        );
    }

    #[test]
    fn reject_moves_to_reject() {
        assert_eq!(
            next_status(
                TransactionStatus::WaitingForConfirmation,
                LifecycleAction::Decide(Decision::Reject)
            ),
            Ok(TransactionStatus::Reject)
        );
    }

    #[test]
    fn expire_moves_to_expired() {
        assert_eq!(
            next_status(TransactionStatus::WaitingForPayment, LifecycleAction::Expire),
            Ok(TransactionStatus::Expired)
        );
    }

    // ─── Illegal transitions ───

    #[test]
    fn expire_loses_after_proof_submission() {
        let result = next_status(
            TransactionStatus::WaitingForConfirmation,
            LifecycleAction::Expire,
        );
        assert!(result.is_err());
    }

    #[test]
    fn decision_requires_a_proof_first() {
        for decision in [Decision::Accept, Decision::Reject] {
            let result = next_status(
                TransactionStatus::WaitingForPayment,
                LifecycleAction::Decide(decision),
            );
            assert!(result.is_err());
        }
    }

    #[test]
    fn proof_resubmission_after_confirmation_is_rejected() {
        let result = next_status(
            TransactionStatus::WaitingForConfirmation,
            LifecycleAction::SubmitProof,
        );
        assert!(result.is_err());
    }

    // ─── Properties ───

    proptest! {
        /// No action ever leaves a terminal status.
        #[test]
        fn terminal_statuses_are_absorbing(
            status in arb_status().prop_filter("terminal only", |s| s.is_terminal()),
            action in arb_action(),
        ) {
            prop_assert!(next_status(status, action).is_err());
        }

        /// Every successful transition lands inside the status set and
        /// actually changes the status (the machine has no self-loops).
        #[test]
        fn closure_over_the_status_set(
            status in arb_status(),
            action in arb_action(),
        ) {
            if let Ok(next) = next_status(status, action) {
                prop_assert!(ALL_STATUSES.contains(&next));
                prop_assert_ne!(status, next);
            }
        }

        /// Exactly the transitions into REJECT and EXPIRED compensate stock.
        #[test]
        fn compensation_matches_terminal_exits(
            status in arb_status(),
            action in arb_action(),
        ) {
            let compensating = compensates(status, action);
            match next_status(status, action) {
                Ok(TransactionStatus::Reject) | Ok(TransactionStatus::Expired) => {
                    prop_assert!(compensating)
                }
                _ => prop_assert!(!compensating),
            }
        }

        /// An error reports the status and action it refused.
        #[test]
        fn errors_carry_context(status in arb_status(), action in arb_action()) {
            if let Err(e) = next_status(status, action) {
                prop_assert_eq!(e.from, status);
                prop_assert_eq!(e.action, action);
            }
        }
    }
}
