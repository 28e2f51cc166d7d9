//! Deliver-once notification sinks.
//!
//! A listener moves from pending to exactly one of delivered or closed. The
//! sink is a one-slot channel, so delivering never waits on the consumer.

use crate::notification::Notification;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;

enum ListenerState {
    Pending(oneshot::Sender<Notification>),
    Delivered,
    Closed,
}

/// Registry-side half of a pending wait.
pub(crate) struct TransactionListener {
    done: CancellationToken,
    state: ListenerState,
}

impl TransactionListener {
    /// Create a listener and the receiver handed back to the caller.
    pub(crate) fn new(done: CancellationToken) -> (Self, NotificationReceiver) {
        let (sender, receiver) = oneshot::channel();
        let listener = Self {
            done,
            state: ListenerState::Pending(sender),
        };
        (listener, NotificationReceiver { receiver })
    }

    /// Whether the caller has given up on this wait.
    pub(crate) fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Deliver the notification and close the sink.
    pub(crate) fn receive(&mut self, notification: Notification) {
        match std::mem::replace(&mut self.state, ListenerState::Closed) {
            ListenerState::Pending(sender) => {
                // The caller may already have dropped its receiver.
                let _ = sender.send(notification);
                self.state = ListenerState::Delivered;
            }
            settled => self.state = settled,
        }
    }

    /// Close the sink without a value. No-op once delivered.
    pub(crate) fn close(&mut self) {
        if matches!(self.state, ListenerState::Pending(_)) {
            self.state = ListenerState::Closed;
        }
    }
}

/// Result of polling a [`NotificationReceiver`] without waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing delivered yet.
    Pending,
    Delivered(Notification),
    /// Closed without a value, or the value was already taken.
    Closed,
}

/// Caller-side half of a pending wait. Yields at most one notification.
#[derive(Debug)]
pub struct NotificationReceiver {
    receiver: oneshot::Receiver<Notification>,
}

impl NotificationReceiver {
    /// A receiver that is already closed.
    pub(crate) fn closed() -> Self {
        let (_, receiver) = oneshot::channel();
        Self { receiver }
    }

    /// Wait for the notification. `None` means the sink was closed without
    /// a value (cancelled listener or notifier shut down).
    pub async fn recv(self) -> Option<Notification> {
        self.receiver.await.ok()
    }

    /// Check for a notification without waiting.
    pub fn try_recv(&mut self) -> Delivery {
        match self.receiver.try_recv() {
            Ok(notification) => Delivery::Delivered(notification),
            Err(TryRecvError::Empty) => Delivery::Pending,
            Err(TryRecvError::Closed) => Delivery::Closed,
        }
    }
}
