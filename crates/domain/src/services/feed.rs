//! Change feed for consultation writes.
//!
//! Replaces backend live queries with an explicit channel: every successful
//! write publishes a [`ConsultationChange`], and watchers hold a
//! [`Subscription`] they can cancel.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::consultation::{ConsultationFilter, ConsultationRecord};

/// Default number of buffered changes per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// A committed write to the consultation collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsultationChange {
    Created(ConsultationRecord),
    Updated {
        before: ConsultationRecord,
        after: ConsultationRecord,
    },
    Deleted(ConsultationRecord),
}

impl ConsultationChange {
    /// Whether the change adds, alters or removes a record visible through `filter`.
    pub fn touches(&self, filter: &ConsultationFilter) -> bool {
        match self {
            ConsultationChange::Created(record) | ConsultationChange::Deleted(record) => {
                filter.matches(record)
            }
            ConsultationChange::Updated { before, after } => {
                filter.matches(before) || filter.matches(after)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConsultationChange::Created(_) => "created",
            ConsultationChange::Updated { .. } => "updated",
            ConsultationChange::Deleted(_) => "deleted",
        }
    }
}

/// Fan-out of consultation changes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ConsultationChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn publish(&self, change: ConsultationChange) {
        let kind = change.kind();
        if self.sender.send(change).is_err() {
            tracing::trace!(kind, "No change feed subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsultationChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Handle to a running watch. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stops delivery. A callback already running on another thread may
    /// still complete.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
