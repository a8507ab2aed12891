//! The transaction lifecycle state machine.
//!
//! Pure transition logic lives here; durable application of transitions is
//! the store's job.

pub mod transitions;

pub use transitions::{LifecycleAction, TransitionError, next_status};
