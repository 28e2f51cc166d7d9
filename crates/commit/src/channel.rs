//! Per-channel commit dispatch.

use crate::listener::{NotificationReceiver, TransactionListener};
use crate::notification::{BlockCommit, Notification};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Listeners waiting on one channel, keyed by transaction id.
#[derive(Default)]
struct Listeners {
    by_transaction: HashMap<String, Vec<TransactionListener>>,
    closed: bool,
}

impl Listeners {
    fn register(&mut self, transaction_id: &str, listener: TransactionListener) {
        self.by_transaction
            .entry(transaction_id.to_string())
            .or_default()
            .push(listener);
    }

    /// Drop listeners whose caller has gone away.
    fn remove_completed(&mut self) -> usize {
        let mut removed = 0;
        self.by_transaction.retain(|_, listeners| {
            listeners.retain_mut(|listener| {
                if !listener.is_done() {
                    return true;
                }
                listener.close();
                removed += 1;
                false
            });
            !listeners.is_empty()
        });
        removed
    }

    /// Deliver every outcome in the block and forget the matched ids.
    fn receive_block(&mut self, commit: &BlockCommit) -> usize {
        let mut delivered = 0;
        for (transaction_id, validation_code) in &commit.tx_validation_codes {
            let Some(listeners) = self.by_transaction.remove(transaction_id) else {
                continue;
            };
            for mut listener in listeners {
                listener.receive(Notification {
                    block_number: commit.block_number,
                    transaction_id: transaction_id.clone(),
                    validation_code: *validation_code,
                });
                delivered += 1;
            }
        }
        delivered
    }

    fn close(&mut self) {
        for listener in self.by_transaction.values_mut().flatten() {
            listener.close();
        }
        self.by_transaction.clear();
        self.closed = true;
    }

    fn len(&self) -> usize {
        self.by_transaction.values().map(Vec::len).sum()
    }
}

/// Fans one channel's block commits out to per-transaction listeners.
///
/// Cloning yields another handle to the same notifier. Once closed, a
/// notifier stays closed; callers replace it with a new instance.
#[derive(Clone)]
pub struct ChannelNotifier {
    channel_id: Arc<str>,
    listeners: Arc<Mutex<Listeners>>,
}

impl ChannelNotifier {
    /// Start dispatching `commits`. Must be called within a tokio runtime.
    ///
    /// The notifier closes when `done` is cancelled or when the commit
    /// source is dropped.
    pub fn new(
        channel_id: impl Into<String>,
        done: CancellationToken,
        commits: mpsc::Receiver<BlockCommit>,
    ) -> Self {
        let notifier = Self {
            channel_id: Arc::from(channel_id.into()),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        };

        tokio::spawn(notifier.clone().run(done, commits));
        notifier
    }

    async fn run(self, done: CancellationToken, mut commits: mpsc::Receiver<BlockCommit>) {
        tracing::debug!(channel = %self.channel_id, "commit notifier started");

        loop {
            tokio::select! {
                commit = commits.recv() => match commit {
                    Some(commit) => self.dispatch(&commit),
                    None => {
                        tracing::info!(channel = %self.channel_id, "commit source closed");
                        break;
                    }
                },
                _ = done.cancelled() => {
                    tracing::info!(channel = %self.channel_id, "commit notifier shutting down");
                    break;
                }
            }
        }

        self.listeners.lock().close();
    }

    fn dispatch(&self, commit: &BlockCommit) {
        let mut listeners = self.listeners.lock();
        let removed = listeners.remove_completed();
        let delivered = listeners.receive_block(commit);

        tracing::debug!(
            channel = %self.channel_id,
            block = commit.block_number,
            transactions = commit.tx_validation_codes.len(),
            delivered,
            removed,
            "dispatched block commit"
        );
    }

    /// Wait for `transaction_id` to commit. The returned receiver yields at
    /// most one notification; it is reclaimed without a value once `done` is
    /// cancelled and the next block arrives. Registering on a closed notifier
    /// returns an already-closed receiver.
    pub fn register_listener(
        &self,
        done: CancellationToken,
        transaction_id: &str,
    ) -> NotificationReceiver {
        let mut listeners = self.listeners.lock();
        if listeners.closed {
            return NotificationReceiver::closed();
        }

        let (listener, receiver) = TransactionListener::new(done);
        listeners.register(transaction_id, listener);
        receiver
    }

    /// Whether the notifier has shut down.
    pub fn is_closed(&self) -> bool {
        self.listeners.lock().closed
    }

    /// Number of listeners still pending.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::Delivery;
    use ledgergate_core::ValidationCode;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn setup() -> (ChannelNotifier, mpsc::Sender<BlockCommit>, CancellationToken) {
        let (commits_tx, commits_rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let notifier = ChannelNotifier::new("test_channel", shutdown.clone(), commits_rx);
        (notifier, commits_tx, shutdown)
    }

    async fn wait_until_closed(notifier: &ChannelNotifier) {
        tokio::time::timeout(WAIT, async {
            while !notifier.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_delivers_matching_transaction() {
        let (notifier, commits, _shutdown) = setup();
        let receiver = notifier.register_listener(CancellationToken::new(), "tx1");

        commits
            .send(BlockCommit::new(7).with_transaction("tx1", ValidationCode::Valid))
            .await
            .unwrap();

        let notification = tokio::time::timeout(WAIT, receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            notification,
            Notification {
                block_number: 7,
                transaction_id: "tx1".into(),
                validation_code: ValidationCode::Valid,
            }
        );
        assert_eq!(notifier.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_closed_after_delivery() {
        let (notifier, commits, _shutdown) = setup();
        let mut receiver = notifier.register_listener(CancellationToken::new(), "tx1");

        commits
            .send(BlockCommit::new(7).with_transaction("tx1", ValidationCode::Valid))
            .await
            .unwrap();
        commits
            .send(BlockCommit::new(8).with_transaction("tx1", ValidationCode::DuplicateTxid))
            .await
            .unwrap();

        tokio::time::timeout(WAIT, async {
            loop {
                match receiver.try_recv() {
                    Delivery::Pending => tokio::task::yield_now().await,
                    Delivery::Delivered(notification) => {
                        assert_eq!(notification.block_number, 7);
                        break;
                    }
                    Delivery::Closed => panic!("closed without a value"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(receiver.try_recv(), Delivery::Closed);
    }

    #[tokio::test]
    async fn test_multiple_listeners_same_transaction() {
        let (notifier, commits, _shutdown) = setup();
        let first = notifier.register_listener(CancellationToken::new(), "tx1");
        let second = notifier.register_listener(CancellationToken::new(), "tx1");
        let other = notifier.register_listener(CancellationToken::new(), "tx2");

        commits
            .send(
                BlockCommit::new(3).with_transaction("tx1", ValidationCode::MvccReadConflict),
            )
            .await
            .unwrap();

        let first = tokio::time::timeout(WAIT, first.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(WAIT, second.recv()).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.validation_code, ValidationCode::MvccReadConflict);

        assert_eq!(notifier.listener_count(), 1);
        drop(other);
    }

    #[tokio::test]
    async fn test_cancelled_listener_swept_before_delivery() {
        let (notifier, commits, _shutdown) = setup();
        let done = CancellationToken::new();
        let receiver = notifier.register_listener(done.clone(), "tx1");
        let keeper = notifier.register_listener(CancellationToken::new(), "tx2");

        done.cancel();
        assert_eq!(notifier.listener_count(), 2);

        commits
            .send(BlockCommit::new(1).with_transaction("tx1", ValidationCode::Valid))
            .await
            .unwrap();

        assert_eq!(tokio::time::timeout(WAIT, receiver.recv()).await.unwrap(), None);
        assert_eq!(notifier.listener_count(), 1);
        drop(keeper);
    }

    #[tokio::test]
    async fn test_shutdown_closes_pending_listeners() {
        let (notifier, _commits, shutdown) = setup();
        let receiver = notifier.register_listener(CancellationToken::new(), "tx1");

        shutdown.cancel();

        assert_eq!(tokio::time::timeout(WAIT, receiver.recv()).await.unwrap(), None);
        wait_until_closed(&notifier).await;
        assert_eq!(notifier.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_source_close_closes_notifier() {
        let (notifier, commits, _shutdown) = setup();
        let receiver = notifier.register_listener(CancellationToken::new(), "tx1");

        drop(commits);

        assert_eq!(tokio::time::timeout(WAIT, receiver.recv()).await.unwrap(), None);
        wait_until_closed(&notifier).await;
        assert!(notifier.is_closed());
    }

    #[tokio::test]
    async fn test_register_after_close_returns_closed_sink() {
        let (notifier, commits, _shutdown) = setup();
        drop(commits);
        wait_until_closed(&notifier).await;

        let mut receiver = notifier.register_listener(CancellationToken::new(), "tx1");
        assert_eq!(receiver.try_recv(), Delivery::Closed);
        assert_eq!(notifier.listener_count(), 0);
    }
}
