//! Live presence observers.
//!
//! Each observer runs one task that owns a change subscription and writes
//! into a [`watch`] channel. The caller holds an [`ObserverWatch`]; once it
//! is cancelled (or dropped) the observed value is frozen.

pub mod cohort;
pub mod indicator;
pub mod subject;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::feed::SubscriptionHandle;

/// Write side of an observed value. Closing it drops the sender, so nothing
/// can be published afterwards.
#[derive(Debug)]
pub(crate) struct StateSlot<T> {
    sender: Arc<Mutex<Option<watch::Sender<T>>>>,
}

impl<T> Clone for StateSlot<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> StateSlot<T> {
    pub(crate) fn new(initial: T) -> (Self, watch::Receiver<T>) {
        let (tx, rx) = watch::channel(initial);
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Replace the value. Returns `false` once closed.
    pub(crate) fn publish(&self, value: T) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                tx.send_replace(value);
                true
            }
            None => false,
        }
    }

    pub(crate) fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Caller's handle on a live observer.
#[derive(Debug)]
pub struct ObserverWatch<T> {
    receiver: watch::Receiver<T>,
    slot: StateSlot<T>,
    cancel: CancellationToken,
    subscription: Option<SubscriptionHandle>,
}

impl<T: Clone> ObserverWatch<T> {
    pub(crate) fn new(
        receiver: watch::Receiver<T>,
        slot: StateSlot<T>,
        cancel: CancellationToken,
        subscription: Option<SubscriptionHandle>,
    ) -> Self {
        Self {
            receiver,
            slot,
            cancel,
            subscription,
        }
    }

    /// Latest observed value.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next value. `None` once cancelled.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until `predicate` holds, returning the matching value.
    /// `None` if the observer is cancelled first.
    pub async fn wait_for(&mut self, predicate: impl FnMut(&T) -> bool) -> Option<T> {
        self.receiver
            .wait_for(predicate)
            .await
            .ok()
            .map(|v| (*v).clone())
    }

    /// A receiver that follows the same value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.receiver.clone()
    }

    /// Stop observing. Idempotent; the value never changes afterwards.
    pub fn cancel(&self) {
        self.slot.close();
        self.cancel.cancel();
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
    }

    /// Whether [`Self::cancel`] has run.
    pub fn is_cancelled(&self) -> bool {
        self.slot.is_closed()
    }
}

impl<T> Drop for ObserverWatch<T> {
    fn drop(&mut self) {
        self.slot.close();
        self.cancel.cancel();
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
    }
}

/// Tokio deadline for a wall-clock instant. Past instants fire immediately.
pub(crate) fn deadline_at(at: DateTime<Utc>) -> Instant {
    let remaining = (at - Utc::now()).to_std().unwrap_or_default();
    Instant::now() + remaining
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
