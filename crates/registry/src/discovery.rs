//! Network discovery interface.
//!
//! Discovery is answered from the peer's in-process membership view, so its
//! methods are synchronous.

use std::collections::BTreeMap;
use thiserror::Error;

/// A discovery query failed. The message is surfaced to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DiscoveryError(pub String);

/// One chaincode in an endorsement interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeCall {
    pub name: String,
}

/// The chaincodes a transaction touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeInterest {
    pub chaincodes: Vec<ChaincodeCall>,
}

impl ChaincodeInterest {
    /// Interest in a single chaincode.
    pub fn for_chaincode(name: impl Into<String>) -> Self {
        Self {
            chaincodes: vec![ChaincodeCall { name: name.into() }],
        }
    }
}

/// A peer named in an endorsement descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Stable membership id.
    pub pki_id: Vec<u8>,
    /// Endpoint advertised in the peer's membership information.
    pub endpoint: String,
}

/// Minimum number of endorsements required from each group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub quantities_by_group: BTreeMap<String, u32>,
}

/// Peer groups and layouts that satisfy a chaincode's endorsement policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndorsementDescriptor {
    pub chaincode: String,
    pub endorsers_by_groups: BTreeMap<String, Vec<Peer>>,
    /// Alternative layouts, any one of which satisfies the policy.
    pub layouts: Vec<Layout>,
}

/// A live member of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMember {
    pub pki_id: Vec<u8>,
    pub endpoint: String,
}

/// Organization (MSP) owning a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentityInfo {
    pub pki_id: Vec<u8>,
    pub organization: String,
}

/// An ordering service node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdererEndpoint {
    pub host: String,
    pub port: u16,
}

impl OrdererEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Trust material of one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MspConfig {
    pub tls_root_certs: Vec<Vec<u8>>,
}

/// Channel configuration relevant to broadcasting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigResult {
    /// Orderer endpoints keyed by owning MSP id.
    pub orderers: BTreeMap<String, Vec<OrdererEndpoint>>,
    pub msps: BTreeMap<String, MspConfig>,
}

/// Network discovery service.
pub trait Discovery: Send + Sync {
    /// Peer groups and layouts satisfying the endorsement policy of `interest`.
    fn peers_for_endorsement(
        &self,
        channel: &str,
        interest: &ChaincodeInterest,
    ) -> Result<EndorsementDescriptor, DiscoveryError>;

    /// Members of `channel` currently alive.
    fn peers_of_channel(&self, channel: &str) -> Result<Vec<NetworkMember>, DiscoveryError>;

    /// Organization of every known member.
    fn identity_info(&self) -> Vec<PeerIdentityInfo>;

    /// Orderer endpoints and MSP trust material for `channel`.
    fn config(&self, channel: &str) -> Result<ConfigResult, DiscoveryError>;
}
