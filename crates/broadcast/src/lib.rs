//! Ordering service broadcast for ledgergate.
//!
//! Resolves a channel's orderers from discovery configuration, sends a
//! signed envelope to one of them and interprets its acknowledgement.

pub mod broadcaster;

pub use broadcaster::{BroadcastError, OrdererBroadcaster, OrdererTarget};
