//! Core primitives for ledgergate.
//!
//! This crate provides the data model shared by every gateway component:
//! - Content digests
//! - Proposals, proposal responses and endorsements
//! - Transaction envelopes
//! - Endpoint identity and per-endpoint error details
//! - Validation codes and orderer acknowledgement statuses

pub mod codec;
pub mod endpoint;
pub mod hash;
pub mod proposal;
pub mod status;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use codec::CodecError;
pub use endpoint::{EndpointConfig, EndpointError};
pub use hash::{hash, hash_concat, Hash};
pub use proposal::{
    Endorsement, Proposal, ProposalError, ProposalHeader, ProposalResponse,
    ProposalResponsePayload, Response, SignedProposal, STATUS_OK,
};
pub use status::{BroadcastStatus, ValidationCode};
pub use transaction::{ChannelHeader, Envelope, Payload, Transaction};
