//! Multi-channel notifier facade.

use crate::channel::ChannelNotifier;
use crate::listener::NotificationReceiver;
use crate::notification::BlockCommit;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The ledger refused to provide a commit stream.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SupplierError(pub String);

/// Errors that can occur while registering for a commit notification.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("failed to obtain commit notifications: {0}")]
    Supplier(#[from] SupplierError),

    #[error("commit notifier is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NotifierError>;

/// Source of per-channel block commit streams, typically the peer's ledger.
pub trait CommitEventSupplier: Send + Sync {
    /// Open a commit stream for `channel_id`. The stream should end once
    /// `done` is cancelled.
    fn commit_notifications(
        &self,
        done: CancellationToken,
        channel_id: &str,
    ) -> std::result::Result<mpsc::Receiver<BlockCommit>, SupplierError>;
}

/// Routes commit waits to a lazily-created notifier per channel.
pub struct Notifier {
    supplier: Arc<dyn CommitEventSupplier>,
    done: CancellationToken,
    channels: Mutex<HashMap<String, ChannelNotifier>>,
}

impl Notifier {
    /// Create a notifier drawing commit streams from `supplier`.
    pub fn new(supplier: Arc<dyn CommitEventSupplier>) -> Self {
        Self {
            supplier,
            done: CancellationToken::new(),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Register for the commit of `transaction_id` on `channel_id`.
    ///
    /// Must be called within a tokio runtime: the first registration for a
    /// channel starts its dispatch task.
    pub fn notify(
        &self,
        done: CancellationToken,
        channel_id: &str,
        transaction_id: &str,
    ) -> Result<NotificationReceiver> {
        let notifier = self.channel_notifier(channel_id)?;
        Ok(notifier.register_listener(done, transaction_id))
    }

    fn channel_notifier(&self, channel_id: &str) -> Result<ChannelNotifier> {
        if let Some(notifier) = self.live_notifier(channel_id)? {
            return Ok(notifier);
        }

        // Open the stream without holding the channel map
        let done = self.done.child_token();
        let commits = self
            .supplier
            .commit_notifications(done.clone(), channel_id)?;

        let mut channels = self.channels.lock();
        if self.done.is_cancelled() {
            done.cancel();
            return Err(NotifierError::Closed);
        }
        if let Some(existing) = channels.get(channel_id) {
            if !existing.is_closed() {
                // Another registration got there first
                done.cancel();
                return Ok(existing.clone());
            }
            tracing::info!(channel = channel_id, "replacing closed commit notifier");
        }

        let notifier = ChannelNotifier::new(channel_id, done, commits);
        channels.insert(channel_id.to_string(), notifier.clone());

        Ok(notifier)
    }

    fn live_notifier(&self, channel_id: &str) -> Result<Option<ChannelNotifier>> {
        if self.done.is_cancelled() {
            return Err(NotifierError::Closed);
        }

        let channels = self.channels.lock();
        Ok(channels
            .get(channel_id)
            .filter(|notifier| !notifier.is_closed())
            .cloned())
    }

    /// Shut down every channel notifier. Pending waits close without a value.
    pub fn close(&self) {
        self.done.cancel();
        self.channels.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }
}
