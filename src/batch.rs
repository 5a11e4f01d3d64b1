//! Fan-out delivery to many subscriptions.
//!
//! A fixed number of scoped worker threads pull subscriptions off a shared
//! cursor. Each subscription is validated and sent on its own, so a
//! malformed entry only fails itself. Results are reassembled in input
//! order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::dispatch::{CancelFlag, Classification, DeliveryOutcome, Dispatcher, PushMessage};
use crate::error::PushError;
use crate::subscription::SubscriptionInfo;
use crate::transport::Transport;

/// Default number of concurrent sends.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Result for one input subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Position in the input slice.
    pub index: usize,
    /// Endpoint as given in the input, for store cleanup.
    pub endpoint: String,
    /// Outcome, or the local error that prevented a request.
    pub result: Result<DeliveryOutcome, PushError>,
}

impl BatchEntry {
    /// Whether the push service accepted the message.
    pub fn success(&self) -> bool {
        self.result.as_ref().is_ok_and(DeliveryOutcome::success)
    }

    /// Whether the push service reported the subscription gone.
    pub fn is_expired(&self) -> bool {
        self.classification() == Some(Classification::SubscriptionExpired)
    }

    /// Classification when a response (or interruption) was recorded.
    pub fn classification(&self) -> Option<Classification> {
        self.result.as_ref().ok().map(|o| o.classification)
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    entries: Vec<BatchEntry>,
    requested: usize,
    cancelled: bool,
}

impl BatchReport {
    /// All entries, ordered by input index.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Number of subscriptions attempted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subscriptions passed in.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Whether cancellation cut the batch short.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Entries the push service reported as 404/410.
    pub fn expired(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.is_expired())
    }

    /// Every entry that did not succeed, including local errors.
    pub fn failed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.success())
    }

    /// Entries that were delivered.
    pub fn delivered(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.success())
    }
}

/// Sends one message to many subscriptions with bounded parallelism.
#[derive(Debug)]
pub struct BatchDispatcher<T> {
    dispatcher: Dispatcher<T>,
    concurrency: usize,
}

impl<T: Transport> BatchDispatcher<T> {
    /// Wrap a dispatcher; `concurrency` is clamped to at least one.
    pub fn new(dispatcher: Dispatcher<T>, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Underlying single-send dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Worker count.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Send to every subscription. Returns exactly one entry per input.
    pub fn send_all(&self, subscriptions: &[SubscriptionInfo], message: &PushMessage) -> BatchReport {
        self.send_all_with_cancel(subscriptions, message, &CancelFlag::new())
    }

    /// Send to every subscription until `cancel` is set.
    ///
    /// Once cancelled no new sends start; requests already in flight finish
    /// and only attempted subscriptions appear in the report.
    pub fn send_all_with_cancel(
        &self,
        subscriptions: &[SubscriptionInfo],
        message: &PushMessage,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let cursor = &AtomicUsize::new(0);
        let workers = self.concurrency.min(subscriptions.len());

        let mut entries: Vec<BatchEntry> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| scope.spawn(move || self.worker(subscriptions, message, cursor, cancel)))
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });
        entries.sort_by_key(|e| e.index);

        let report = BatchReport {
            cancelled: entries.len() < subscriptions.len(),
            requested: subscriptions.len(),
            entries,
        };
        log::info!(
            "[WebPush] Batch: {}/{} delivered, {} expired, {} failed{}",
            report.delivered().count(),
            report.requested(),
            report.expired().count(),
            report.failed().count(),
            if report.cancelled() { " (cancelled)" } else { "" }
        );
        report
    }

    fn worker(
        &self,
        subscriptions: &[SubscriptionInfo],
        message: &PushMessage,
        cursor: &AtomicUsize,
        cancel: &CancelFlag,
    ) -> Vec<BatchEntry> {
        let mut done = Vec::new();
        while !cancel.is_cancelled() {
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(info) = subscriptions.get(index) else {
                break;
            };

            let result = self.dispatcher.send(info, message);
            if let Err(e) = &result {
                log::debug!("[WebPush] Subscription #{} not sent: {}", index, e);
            }
            done.push(BatchEntry {
                index,
                endpoint: info.endpoint.clone(),
                result,
            });
        }
        done
    }
}
