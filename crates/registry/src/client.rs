//! Client handles for remote peers and orderers.

use async_trait::async_trait;
use ledgergate_core::{BroadcastStatus, Envelope, ProposalResponse, SignedProposal};
use std::sync::Arc;
use thiserror::Error;

/// A transport-level failure reported by a dial or an RPC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Proposal endpoint of a peer.
#[async_trait]
pub trait EndorserClient: Send + Sync {
    /// Simulate and endorse a proposal.
    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError>;
}

/// Acknowledgement from an orderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub status: BroadcastStatus,
    pub info: String,
}

/// One broadcast exchange with an orderer.
#[async_trait]
pub trait BroadcastStream: Send {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Next acknowledgement. `None` means the orderer answered with nothing.
    async fn recv(&mut self) -> Result<Option<BroadcastResponse>, TransportError>;
}

/// Broadcast endpoint of an orderer.
#[async_trait]
pub trait OrdererClient: Send + Sync {
    /// Open a broadcast exchange.
    async fn broadcast(&self) -> Result<Box<dyn BroadcastStream>, TransportError>;
}

/// Creates client handles for network addresses (dialing, TLS).
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    async fn connect_endorser(
        &self,
        address: &str,
    ) -> Result<Arc<dyn EndorserClient>, TransportError>;

    async fn connect_orderer(
        &self,
        address: &str,
        tls_root_certs: &[Vec<u8>],
    ) -> Result<Arc<dyn OrdererClient>, TransportError>;
}
