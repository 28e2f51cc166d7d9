//! Transaction proposals and the responses peers return for them.

use crate::codec::{self, CodecError};
use crate::hash::{hash, hash_concat, Hash};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code a peer uses for a successful chaincode invocation.
pub const STATUS_OK: i32 = 200;

/// Length of the random nonce that seeds a transaction id.
const NONCE_LEN: usize = 24;

/// Errors that can occur while unpacking a signed proposal.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("a signed proposal is required")]
    Empty,

    #[error("error unmarshaling Proposal: {0}")]
    Malformed(#[source] CodecError),

    #[error("the proposal does not name a channel")]
    MissingChannel,

    #[error("the proposal does not name a chaincode")]
    MissingChaincode,
}

/// Header fields identifying a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalHeader {
    /// Channel the transaction targets.
    pub channel_id: String,
    /// Chaincode being invoked.
    pub chaincode_id: String,
    /// Transaction id derived from the nonce and creator.
    pub transaction_id: String,
    /// Serialized identity of the submitting client.
    pub creator: Vec<u8>,
    /// Random nonce.
    pub nonce: Vec<u8>,
}

/// A request to simulate a chaincode invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub header: ProposalHeader,
    /// Chaincode arguments.
    pub input: Vec<Vec<u8>>,
}

impl Proposal {
    /// Create a proposal with a fresh nonce and derived transaction id.
    pub fn new(
        channel_id: impl Into<String>,
        chaincode_id: impl Into<String>,
        creator: Vec<u8>,
        input: Vec<Vec<u8>>,
    ) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let transaction_id = Self::compute_transaction_id(&nonce, &creator);

        Self {
            header: ProposalHeader {
                channel_id: channel_id.into(),
                chaincode_id: chaincode_id.into(),
                transaction_id,
                creator,
                nonce,
            },
            input,
        }
    }

    /// Transaction id = hex(hash(nonce || creator)).
    pub fn compute_transaction_id(nonce: &[u8], creator: &[u8]) -> String {
        hash_concat(&[nonce, creator]).to_hex()
    }

    /// Encode the proposal.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    /// Wrap the proposal with a client signature.
    pub fn signed(&self, signature: Vec<u8>) -> Result<SignedProposal, CodecError> {
        Ok(SignedProposal {
            proposal_bytes: self.encode()?,
            signature,
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.header.channel_id
    }

    pub fn chaincode_id(&self) -> &str {
        &self.header.chaincode_id
    }

    pub fn transaction_id(&self) -> &str {
        &self.header.transaction_id
    }
}

/// An encoded proposal plus the client's signature over it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedProposal {
    /// Decode the proposal and check that it is routable.
    pub fn unpack(&self) -> Result<Proposal, ProposalError> {
        if self.proposal_bytes.is_empty() {
            return Err(ProposalError::Empty);
        }

        let proposal: Proposal =
            codec::decode(&self.proposal_bytes).map_err(ProposalError::Malformed)?;

        if proposal.header.channel_id.is_empty() {
            return Err(ProposalError::MissingChannel);
        }
        if proposal.header.chaincode_id.is_empty() {
            return Err(ProposalError::MissingChaincode);
        }

        Ok(proposal)
    }
}

/// The chaincode-level result of a simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

impl Response {
    /// A successful response carrying `payload`.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            payload: payload.into(),
        }
    }

    /// A failed response with the given status and message.
    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: Vec::new(),
        }
    }
}

/// A peer's signature over the proposal response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    /// Serialized identity of the endorsing peer.
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

/// The simulated outcome that endorsers sign. Endorsers running the same
/// deterministic chaincode produce byte-identical encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponsePayload {
    pub proposal_hash: Hash,
    pub response: Response,
}

/// What a peer returns for a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    /// Encoded [`ProposalResponsePayload`].
    pub payload: Vec<u8>,
    pub response: Response,
    pub endorsement: Endorsement,
}

impl ProposalResponse {
    /// Build a response, encoding the signed payload from its parts.
    pub fn new(
        proposal_hash: Hash,
        response: Response,
        endorsement: Endorsement,
    ) -> Result<Self, CodecError> {
        let payload = codec::encode(&ProposalResponsePayload {
            proposal_hash,
            response: response.clone(),
        })?;

        Ok(Self {
            payload,
            response,
            endorsement,
        })
    }

    /// Digest of the signed payload.
    pub fn payload_hash(&self) -> Hash {
        hash(&self.payload)
    }
}
