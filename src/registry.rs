//! In-memory subscriber registry shared by the API and the scheduler.

use crate::core::Subscriber;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::debug;

/// Append-only list of subscriptions with atomic snapshots.
///
/// Writers publish a new list with read-copy-update, so a snapshot taken by
/// the scheduler never changes underneath it and readers never wait for
/// writers.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<ArcSwap<Vec<Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription. Duplicates are kept as separate entries.
    pub fn add(&self, subscriber: Subscriber) {
        debug!(email = %subscriber.email, city = %subscriber.city, "Adding subscriber");
        let previous = self.subscribers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(subscriber.clone());
            next
        });
        let total = previous.len() + 1;
        metrics::counter!("subscribers_registered_total").increment(1);
        metrics::gauge!("subscribers").set(total as f64);
    }

    /// Returns the subscriptions registered at the time of the call.
    pub fn snapshot(&self) -> Arc<Vec<Subscriber>> {
        self.subscribers.load_full()
    }

    pub fn len(&self) -> usize {
        self.subscribers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish()
    }
}
