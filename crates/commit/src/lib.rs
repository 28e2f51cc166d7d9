//! Commit notification multiplexer for ledgergate.
//!
//! Turns a channel's ordered stream of block commits into independent,
//! cancellable, deliver-once waits keyed by transaction id:
//! - **ChannelNotifier**: one dispatch task per channel fanning commits out
//!   to registered listeners
//! - **Notifier**: lazily creates (and replaces closed) channel notifiers
//!   from a [`CommitEventSupplier`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ledgergate_commit::{BlockCommit, ChannelNotifier};
//! use ledgergate_core::ValidationCode;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let (commits_tx, commits_rx) = mpsc::channel(16);
//! let notifier = ChannelNotifier::new("mychannel", CancellationToken::new(), commits_rx);
//!
//! let receiver = notifier.register_listener(CancellationToken::new(), "tx1");
//! commits_tx
//!     .send(BlockCommit::new(7).with_transaction("tx1", ValidationCode::Valid))
//!     .await
//!     .unwrap();
//!
//! let notification = receiver.recv().await.unwrap();
//! assert_eq!(notification.block_number, 7);
//! # }
//! ```

pub mod channel;
pub mod listener;
pub mod notification;
pub mod notifier;

// Re-export commonly used types
pub use channel::ChannelNotifier;
pub use listener::{Delivery, NotificationReceiver};
pub use notification::{BlockCommit, Notification};
pub use notifier::{CommitEventSupplier, Notifier, NotifierError, SupplierError};
