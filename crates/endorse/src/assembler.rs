//! Transaction assembly from agreeing proposal responses.

use ledgergate_core::codec::{self, CodecError};
use ledgergate_core::{
    ChannelHeader, Envelope, Payload, Proposal, ProposalResponse, Response, Transaction,
};
use thiserror::Error;

/// Errors that can occur while assembling a transaction.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("at least one proposal response is required")]
    NoResponses,

    #[error("proposal response was not successful, error code {status}, msg {message}")]
    Unsuccessful { status: i32, message: String },

    #[error("ProposalResponsePayloads do not match")]
    PayloadMismatch,

    #[error("failed to encode transaction: {0}")]
    Encode(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, AssemblyError>;

/// An unsigned transaction and the result the caller sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTransaction {
    pub envelope: Envelope,
    /// Response of the first endorser; all endorsers agreed on it.
    pub result: Response,
}

/// Build the unsigned envelope for `proposal` from its endorsements.
///
/// Every response must be successful and carry the same signed payload.
/// On any failure no envelope is produced.
pub fn assemble(proposal: &Proposal, responses: &[ProposalResponse]) -> Result<AssembledTransaction> {
    let (first, rest) = responses.split_first().ok_or(AssemblyError::NoResponses)?;

    // Status in [200, 400) counts as success
    if let Some(failed) = responses
        .iter()
        .find(|r| !(200..400).contains(&r.response.status))
    {
        return Err(AssemblyError::Unsuccessful {
            status: failed.response.status,
            message: failed.response.message.clone(),
        });
    }

    let digest = first.payload_hash();
    if rest.iter().any(|r| r.payload_hash() != digest) {
        return Err(AssemblyError::PayloadMismatch);
    }

    let payload = Payload {
        header: ChannelHeader {
            channel_id: proposal.header.channel_id.clone(),
            transaction_id: proposal.header.transaction_id.clone(),
            chaincode_id: proposal.header.chaincode_id.clone(),
            creator: proposal.header.creator.clone(),
        },
        transaction: Transaction {
            proposal_payload: codec::encode(&proposal.input)?,
            response_payload: first.payload.clone(),
            endorsements: responses.iter().map(|r| r.endorsement.clone()).collect(),
        },
    };

    tracing::debug!(
        txid = %proposal.transaction_id(),
        endorsements = responses.len(),
        "assembled transaction"
    );

    Ok(AssembledTransaction {
        envelope: Envelope::unsigned(&payload)?,
        result: first.response.clone(),
    })
}
