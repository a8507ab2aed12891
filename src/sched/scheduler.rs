//! The delayed-job scheduler and its consumer task.
//!
//! [`ExpiryScheduler`] is the capability handed to the orchestrator:
//! `schedule(reference, delay)`, deduplicated by reference. The
//! [`JobRunner`] is the separately-running consumer that sleeps until the
//! next job is due, delivers it to the expiry worker, and redelivers
//! transient failures with exponential backoff up to a bounded attempt
//! count. A job that exhausts its attempts is dropped and surfaced as an
//! operational alert — a dropped expiry means a reservation nobody will
//! reclaim automatically.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::{DelayQueue, ExpiryJob};
use super::retry::RetryConfig;
use crate::types::TxnRef;
use crate::worker::ExpiryWorker;

/// Sleep horizon when no job is pending. A wake notification cuts any sleep
/// short, so this only bounds how long an idle runner parks.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

/// The scheduling capability injected into the orchestrator.
///
/// Implementations must deduplicate on reference: while a job for a
/// reference is pending, scheduling it again is a no-op. This makes
/// scheduling idempotent from the caller's point of view.
pub trait ExpiryScheduler: Send + Sync {
    /// Schedules an expiry check to fire after `delay`. Returns `false` if a
    /// job for this reference was already pending.
    fn schedule(&self, reference: TxnRef, delay: Duration) -> bool {
        let fire_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365));
        self.schedule_at(reference, fire_at)
    }

    /// Schedules an expiry check at an absolute time. Past times fire
    /// immediately. Returns `false` on a deduplicated no-op.
    fn schedule_at(&self, reference: TxnRef, fire_at: DateTime<Utc>) -> bool;
}

/// State shared between scheduler handles and the runner.
struct Shared {
    queue: Mutex<DelayQueue>,
    wake: Notify,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, DelayQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cheap, cloneable handle implementing [`ExpiryScheduler`] against a
/// running [`JobRunner`].
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl ExpiryScheduler for SchedulerHandle {
    fn schedule_at(&self, reference: TxnRef, fire_at: DateTime<Utc>) -> bool {
        let accepted = self.shared.queue().push(ExpiryJob {
            reference,
            fire_at,
            attempt: 0,
        });

        if accepted {
            debug!(reference = %reference, fire_at = %fire_at, "expiry job scheduled");
            // The runner may be parked on a longer sleep; recompute.
            self.shared.wake.notify_one();
        } else {
            debug!(reference = %reference, "expiry job already pending, dedup no-op");
        }
        accepted
    }
}

/// The consumer task: delivers due jobs to the expiry worker.
pub struct JobRunner {
    shared: Arc<Shared>,
    worker: Arc<ExpiryWorker>,
    retry: RetryConfig,
    shutdown: CancellationToken,
}

/// Creates a connected scheduler handle and runner.
///
/// Spawn [`JobRunner::run`] on the runtime; hand the [`SchedulerHandle`] to
/// whoever creates reservations.
pub fn pair(
    worker: Arc<ExpiryWorker>,
    retry: RetryConfig,
    shutdown: CancellationToken,
) -> (SchedulerHandle, JobRunner) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(DelayQueue::new()),
        wake: Notify::new(),
    });

    let handle = SchedulerHandle {
        shared: shared.clone(),
    };
    let runner = JobRunner {
        shared,
        worker,
        retry,
        shutdown,
    };
    (handle, runner)
}

impl JobRunner {
    /// Runs until the cancellation token fires.
    ///
    /// Each iteration drains every due job, then sleeps until the next fire
    /// time, a wake notification (new job scheduled), or shutdown.
    pub async fn run(self) {
        info!("expiry job runner started");

        loop {
            loop {
                let due = self.shared.queue().pop_due(Utc::now());
                match due {
                    Some(job) => self.deliver(job),
                    None => break,
                }
            }

            let sleep_for = match self.shared.queue().next_fire_at() {
                Some(fire_at) => (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                None => IDLE_SLEEP,
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("expiry job runner stopping");
                    return;
                }
                _ = self.shared.wake.notified() => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Delivers one job and decides its fate: acknowledge, redeliver with
    /// backoff, or drop with an alert.
    fn deliver(&self, job: ExpiryJob) {
        match self.worker.handle(&job.reference) {
            Ok(disposition) => {
                debug!(reference = %job.reference, ?disposition, "expiry job done");
            }
            Err(e) if e.is_retryable() => {
                let attempts_made = job.attempt + 1;
                if self.retry.is_exhausted(attempts_made) {
                    // Operational alert: this reservation's stock will not be
                    // reclaimed automatically.
                    error!(
                        reference = %job.reference,
                        attempts = attempts_made,
                        error = %e,
                        "expiry job dropped after exhausting retries; manual reclamation required"
                    );
                } else {
                    let delay = self.retry.delay_for_attempt(job.attempt);
                    let fire_at = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(60));
                    warn!(
                        reference = %job.reference,
                        attempt = attempts_made,
                        retry_in = ?delay,
                        error = %e,
                        "transient expiry failure, redelivering"
                    );
                    self.shared.queue().push(ExpiryJob {
                        reference: job.reference,
                        fire_at,
                        attempt: attempts_made,
                    });
                }
            }
            Err(e) => {
                error!(
                    reference = %job.reference,
                    error = %e,
                    "permanent expiry failure, job dropped"
                );
            }
        }
    }
}
