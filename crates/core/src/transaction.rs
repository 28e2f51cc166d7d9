//! Transaction envelopes handed to the ordering service.

use crate::codec::{self, CodecError};
use crate::proposal::Endorsement;
use serde::{Deserialize, Serialize};

/// Channel-level header of an assembled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHeader {
    pub channel_id: String,
    pub transaction_id: String,
    pub chaincode_id: String,
    /// Serialized identity of the submitting client.
    pub creator: Vec<u8>,
}

/// The endorsed action: the agreed simulation result and every endorsement
/// collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Encoded chaincode input of the original proposal.
    pub proposal_payload: Vec<u8>,
    /// Encoded proposal response payload common to all endorsers.
    pub response_payload: Vec<u8>,
    pub endorsements: Vec<Endorsement>,
}

/// Envelope payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub header: ChannelHeader,
    pub transaction: Transaction,
}

/// Signed, orderer-ready wrapper around an encoded [`Payload`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Encode `payload` into an envelope awaiting the client's signature.
    pub fn unsigned(payload: &Payload) -> Result<Self, CodecError> {
        Ok(Self {
            payload: codec::encode(payload)?,
            signature: Vec::new(),
        })
    }

    /// Attach the client's signature.
    pub fn signed(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Check whether a signature has been attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Decode the payload.
    pub fn unpack(&self) -> Result<Payload, CodecError> {
        codec::decode(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Payload {
        Payload {
            header: ChannelHeader {
                channel_id: "test_channel".into(),
                transaction_id: "tx1".into(),
                chaincode_id: "test_chaincode".into(),
                creator: b"client".to_vec(),
            },
            transaction: Transaction {
                proposal_payload: Vec::new(),
                response_payload: b"ok".to_vec(),
                endorsements: vec![Endorsement::default(), Endorsement::default()],
            },
        }
    }

    #[test]
    fn test_unsigned_envelope_unpacks() {
        let envelope = Envelope::unsigned(&sample_payload()).unwrap();

        assert!(!envelope.is_signed());
        let payload = envelope.unpack().unwrap();
        assert_eq!(payload.header.transaction_id, "tx1");
        assert_eq!(payload.transaction.endorsements.len(), 2);
    }

    #[test]
    fn test_signing_keeps_payload() {
        let envelope = Envelope::unsigned(&sample_payload()).unwrap();
        let payload = envelope.payload.clone();

        let signed = envelope.signed(b"mysignature".to_vec());
        assert!(signed.is_signed());
        assert_eq!(signed.payload, payload);
    }
}
