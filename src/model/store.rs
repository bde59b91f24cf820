//! Observable value container used to publish controller state

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

struct Inner<T> {
    value: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

/// Current value plus an ordered change feed.
///
/// Clones share the same value. Only the crate writes to it; consumers read
/// with [`StateStore::get`] and follow changes with [`StateStore::subscribe`].
pub struct StateStore<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for StateStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> StateStore<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().value)
    }

    /// Replace the value and notify subscribers.
    ///
    /// Returns `false` (and notifies nobody) when the value is unchanged.
    pub(crate) fn set(&self, value: T) -> bool {
        let mut inner = self.lock();
        Self::publish(&mut inner, value)
    }

    /// Derive the next value from the current one, atomically
    pub(crate) fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let mut inner = self.lock();
        let next = f(&inner.value);
        Self::publish(&mut inner, next)
    }

    fn publish(inner: &mut Inner<T>, value: T) -> bool {
        if inner.value == value {
            return false;
        }
        inner.value = value.clone();
        // closed receivers are dropped subscriptions
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        true
    }

    /// Receive every value published after this call, in order
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        Subscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }
}

/// Change feed of a [`StateStore`]; dropping it unsubscribes
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next published value
    pub async fn next_value(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next value if one is already queued
    pub fn try_next_value(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}
