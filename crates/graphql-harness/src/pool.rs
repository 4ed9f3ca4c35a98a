use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::{streaming::SubscriptionInner, ServerAddress, StreamingResult, SubscriptionRequest};

/// Tracks started subscriptions so that a test teardown can close all of them at once.
///
/// The pool doesn't keep subscriptions alive: one dropped by the test is
/// simply skipped.
#[derive(Clone, Default)]
pub struct SubscriptionPool {
    subscriptions: Arc<Mutex<Vec<Weak<SubscriptionInner>>>>,
}

impl SubscriptionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscription request registering itself in this pool.
    pub fn subscription(&self, server: impl ServerAddress) -> SubscriptionRequest {
        SubscriptionRequest::new(server).pool(self)
    }

    pub fn add(&self, subscription: &StreamingResult) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(&subscription.inner));
    }

    /// Number of tracked subscriptions still alive.
    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|subscription| subscription.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every tracked subscription concurrently and empties the pool.
    /// Subscriptions added while this runs are kept for the next call.
    pub async fn end_all(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner))
            .into_iter()
            .filter_map(|subscription| subscription.upgrade())
            .collect::<Vec<_>>();

        tracing::debug!(count = subscriptions.len(), "closing pooled subscriptions");

        futures::future::join_all(subscriptions.iter().map(|subscription| subscription.close())).await;
    }
}

impl std::fmt::Debug for SubscriptionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionPool").field("len", &self.len()).finish()
    }
}
