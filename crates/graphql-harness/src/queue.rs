//! A FIFO rendezvous between push-driven producers and pull-driven consumers.
//!
//! Subscription events are pushed by the transport whenever they arrive while
//! tests pull them one at a time. Pending items and pending waiters are never
//! both non-empty: a push is handed straight to the oldest waiter if there is
//! one, otherwise it is buffered.

use std::{
    collections::VecDeque,
    future::IntoFuture,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::Error;

pub struct RendezvousQueue<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for RendezvousQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for RendezvousQueue<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            })),
        }
    }
}

impl<T> std::fmt::Debug for RendezvousQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("RendezvousQueue")
            .field("items", &state.items.len())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

struct State<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
    next_waiter_id: u64,
}

struct Waiter<T> {
    id: u64,
    sender: oneshot::Sender<T>,
}

impl<T> State<T> {
    /// Hands the item to the oldest live waiter, or buffers it.
    fn deliver(&mut self, mut item: T, requeue: bool) {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.sender.send(item) {
                Ok(()) => return,
                Err(unsent) => item = unsent,
            }
        }

        if requeue {
            self.items.push_front(item);
        } else {
            self.items.push_back(item);
        }
    }
}

fn lock<T>(state: &Mutex<State<T>>) -> MutexGuard<'_, State<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> RendezvousQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never blocks.
    pub fn push(&self, item: T) {
        lock(&self.state).deliver(item, false);
    }

    /// Takes the oldest pending item, or registers a waiter at the tail of the
    /// waiter sequence. The registration happens right away, not on first poll,
    /// so the order of `pop` calls is the order in which they are served.
    pub fn pop(&self) -> Pop<T> {
        let mut state = lock(&self.state);

        let ticket = match state.items.pop_front() {
            Some(item) => Ticket::Ready(item),
            None => {
                let (sender, receiver) = oneshot::channel();
                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                state.waiters.push_back(Waiter { id, sender });
                Ticket::Waiting { id, receiver }
            }
        };

        Pop {
            state: Arc::clone(&self.state),
            ticket: Some(ticket),
        }
    }

    /// Removes and returns every pending item in push order. Waiters are left untouched.
    pub fn flush(&self) -> Vec<T> {
        lock(&self.state).items.drain(..).collect()
    }

    /// Number of pending items, waiters excluded.
    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of consumers currently waiting for an item.
    pub fn waiters(&self) -> usize {
        lock(&self.state).waiters.len()
    }
}

/// A single registered `pop`.
///
/// Dropping it before it resolved unregisters the waiter. If an item had
/// already been handed over, it goes back to the front of the queue.
#[must_use = "a pop does nothing unless awaited"]
pub struct Pop<T> {
    state: Arc<Mutex<State<T>>>,
    ticket: Option<Ticket<T>>,
}

enum Ticket<T> {
    Ready(T),
    Waiting { id: u64, receiver: oneshot::Receiver<T> },
}

impl<T> Pop<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self.ticket, Some(Ticket::Ready(_)))
    }

    /// Waits for the item. With a timeout, fails with [`Error::Timeout`] and
    /// leaves any later push for the next `pop`.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<T, Error> {
        match self.ticket.take() {
            Some(Ticket::Ready(item)) => return Ok(item),
            Some(waiting) => self.ticket = Some(waiting),
            None => return Err(Error::QueueClosed),
        }

        let Some(Ticket::Waiting { receiver, .. }) = self.ticket.as_mut() else {
            return Err(Error::QueueClosed);
        };

        let received = match timeout {
            Some(duration) => match tokio::time::timeout(duration, receiver).await {
                Ok(received) => received,
                // dropping `self` unregisters the waiter
                Err(_) => return Err(Error::Timeout(duration)),
            },
            None => receiver.await,
        };

        self.ticket = None;
        received.map_err(|_| Error::QueueClosed)
    }

    /// Shorthand for `wait(Some(duration))`.
    pub async fn timeout(self, duration: Duration) -> Result<T, Error> {
        self.wait(Some(duration)).await
    }
}

impl<T> Drop for Pop<T> {
    fn drop(&mut self) {
        let (id, mut receiver) = match self.ticket.take() {
            Some(Ticket::Waiting { id, receiver }) => (id, receiver),
            // taken from the pending items, so it is older than anything still buffered
            Some(Ticket::Ready(item)) => {
                lock(&self.state).deliver(item, true);
                return;
            }
            None => return,
        };

        let mut state = lock(&self.state);

        if let Some(position) = state.waiters.iter().position(|waiter| waiter.id == id) {
            state.waiters.remove(position);
            return;
        }

        // A push won the race against the timeout: it is the oldest item, so it
        // goes back in front.
        if let Ok(item) = receiver.try_recv() {
            state.deliver(item, true);
        }
    }
}

impl<T> IntoFuture for Pop<T>
where
    T: Send + 'static,
{
    type Output = Result<T, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait(None))
    }
}
