//! Collaborator interfaces and connection management for ledgergate.
//!
//! - **Discovery**: endorsement descriptors, channel membership, identities
//!   and orderer configuration
//! - **Clients**: peer proposal and orderer broadcast handles, created by an
//!   injectable [`EndpointFactory`]
//! - **ConnectionRegistry**: one cached client per remote address, plus the
//!   gateway's own in-process endorser

pub mod client;
pub mod discovery;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod registry;

// Re-export commonly used types
pub use client::{
    BroadcastResponse, BroadcastStream, EndorserClient, EndpointFactory, OrdererClient,
    TransportError,
};
pub use discovery::{
    ChaincodeCall, ChaincodeInterest, ConfigResult, Discovery, DiscoveryError,
    EndorsementDescriptor, Layout, MspConfig, NetworkMember, OrdererEndpoint, Peer,
    PeerIdentityInfo,
};
pub use registry::{
    ConnectionError, ConnectionRegistry, Endorser, LocalEndorser, Orderer, RegistryOptions,
};
