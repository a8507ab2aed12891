//! Shared helpers and fakes for unit tests.
//!
//! The scheduler and notifier fakes record what they were asked to do
//! instead of doing it, so orchestration tests can assert on effects
//! without timers or delivery.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::notify::{Notification, Notifier};
use crate::sched::ExpiryScheduler;
use crate::store::MarketStore;
use crate::types::{EventId, Money, Ticket, TxnRef, UserId};

/// Opens a fresh store in a temp directory and seeds one ticket
/// (event 1, unit price 10 000 minor units) with the given stock.
pub fn seeded_store(stock: u32) -> (TempDir, Arc<MarketStore>, Ticket) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MarketStore::open(dir.path().join("data")).unwrap());
    let ticket = store
        .register_ticket(EventId(1), Money(10_000), stock)
        .unwrap();
    store.sync().unwrap();
    (dir, store, ticket)
}

/// A notifier that records every notification instead of delivering.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, Notification)>>,
}

impl RecordingNotifier {
    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: UserId, notification: &Notification) {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, notification.clone()));
    }
}

/// A scheduler that records requested jobs, with the same dedup contract as
/// the real one.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(TxnRef, DateTime<Utc>)>>,
    pending: Mutex<HashSet<TxnRef>>,
}

impl RecordingScheduler {
    /// Every accepted schedule call, in order.
    pub fn scheduled(&self) -> Vec<(TxnRef, DateTime<Utc>)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl ExpiryScheduler for RecordingScheduler {
    fn schedule_at(&self, reference: TxnRef, fire_at: DateTime<Utc>) -> bool {
        if !self.pending.lock().unwrap().insert(reference) {
            return false;
        }
        self.scheduled.lock().unwrap().push((reference, fire_at));
        true
    }
}
