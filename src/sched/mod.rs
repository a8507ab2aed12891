//! Delayed expiry-job scheduling: queue, retry policy, and runner.

pub mod queue;
pub mod retry;
pub mod scheduler;

pub use queue::{DelayQueue, ExpiryJob};
pub use retry::RetryConfig;
pub use scheduler::{ExpiryScheduler, JobRunner, SchedulerHandle, pair};
