//! The live side of a subscription: results pushed by the transport, pulled by the test.

use std::{future::IntoFuture, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use futures_util::{lock::Mutex as AsyncMutex, StreamExt};
use tokio::task::AbortHandle;

use crate::{
    queue::Pop,
    websocket::{EventStream, SubscriptionTransport},
    Assertion, AssertionError, Assertions, Error, ExecutionResult, RendezvousQueue,
};

/// Handle to a running subscription.
///
/// Results are buffered as they arrive and handed out in order by
/// [`next`](StreamingResult::next). Dropping the handle stops buffering but
/// only [`close`](StreamingResult::close) tells the server.
pub struct StreamingResult {
    pub(crate) inner: Arc<SubscriptionInner>,
}

pub(crate) struct SubscriptionInner {
    queue: RendezvousQueue<ExecutionResult>,
    transport: AsyncMutex<Option<Box<dyn SubscriptionTransport>>>,
    pump: AbortHandle,
    next_timeout: Option<Duration>,
}

impl SubscriptionInner {
    pub(crate) async fn close(&self) {
        self.pump.abort();

        let Some(transport) = self.transport.lock().await.take() else {
            return;
        };

        transport.dispose().await;
        tracing::debug!("subscription closed");
    }
}

impl Drop for SubscriptionInner {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl StreamingResult {
    pub(crate) fn new(
        transport: Box<dyn SubscriptionTransport>,
        events: EventStream,
        next_timeout: Option<Duration>,
    ) -> Self {
        let queue = RendezvousQueue::new();
        let pump = tokio::spawn(pump(events, queue.clone())).abort_handle();

        StreamingResult {
            inner: Arc::new(SubscriptionInner {
                queue,
                transport: AsyncMutex::new(Some(transport)),
                pump,
                next_timeout,
            }),
        }
    }

    /// The next result in arrival order. Resolves right away if one is
    /// pending, otherwise waits for the transport to deliver it.
    ///
    /// Calls are served in the order they were made, even before being awaited.
    pub fn next(&self) -> NextResult {
        NextResult {
            pop: self.inner.queue.pop(),
            timeout: self.inner.next_timeout,
            assertions: Assertions::default(),
        }
    }

    /// Same as `next().timeout(duration)`.
    pub fn next_within(&self, duration: Duration) -> NextResult {
        self.next().timeout(duration)
    }

    /// Drops every pending result. Waiting `next` calls keep waiting.
    pub fn flush(&self) -> Vec<ExecutionResult> {
        self.inner.queue.flush()
    }

    /// Number of results received but not consumed yet.
    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Fails with [`Error::PendingResults`] if results are waiting to be consumed.
    pub fn expect_no_pending(&self) -> Result<&Self, Error> {
        match self.len() {
            0 => Ok(self),
            pending => Err(Error::PendingResults(pending)),
        }
    }

    /// Stops the subscription and closes the connection. Closing twice is a no-op.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl std::fmt::Debug for StreamingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResult")
            .field("queue", &self.inner.queue)
            .field("next_timeout", &self.inner.next_timeout)
            .finish_non_exhaustive()
    }
}

async fn pump(mut events: EventStream, queue: RendezvousQueue<ExecutionResult>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(result) => queue.push(result),
            Err(err) => {
                tracing::warn!("subscription failed: {err}");
                queue.push(ExecutionResult::from_transport_error(&err));
                return;
            }
        }
    }

    tracing::debug!("subscription completed by the server");
}

/// A pending `next()`, with the assertions to run once it resolves.
#[must_use = "the result is only retrieved when awaited"]
pub struct NextResult {
    pop: Pop<ExecutionResult>,
    timeout: Option<Duration>,
    assertions: Assertions,
}

impl NextResult {
    #[track_caller]
    pub fn expect_no_errors(mut self) -> Self {
        self.assertions.push(Assertion::no_errors());
        self
    }

    #[track_caller]
    pub fn expect<F>(mut self, check: F) -> Self
    where
        F: Fn(&ExecutionResult) -> Option<AssertionError> + Send + Sync + 'static,
    {
        self.assertions.push(Assertion::new(check));
        self
    }

    /// Fails with [`Error::Timeout`] if no result arrives in time. The result
    /// arriving later is kept for the next call.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

impl IntoFuture for NextResult {
    type Output = Result<ExecutionResult, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let result = self.pop.wait(self.timeout).await?;
            self.assertions.run(&result)?;

            Ok(result)
        })
    }
}
