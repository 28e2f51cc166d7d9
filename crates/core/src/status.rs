//! Ledger validation codes and orderer acknowledgement statuses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome assigned to a transaction once its block is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Valid,
    NilEnvelope,
    BadPayload,
    BadCommonHeader,
    BadCreatorSignature,
    InvalidEndorserTransaction,
    BadProposalTxid,
    DuplicateTxid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    ExpiredChaincode,
    InvalidOtherReason,
}

impl ValidationCode {
    /// Numeric code as recorded in block metadata.
    pub fn code(self) -> i32 {
        match self {
            Self::Valid => 0,
            Self::NilEnvelope => 1,
            Self::BadPayload => 2,
            Self::BadCommonHeader => 3,
            Self::BadCreatorSignature => 4,
            Self::InvalidEndorserTransaction => 5,
            Self::BadProposalTxid => 8,
            Self::DuplicateTxid => 9,
            Self::EndorsementPolicyFailure => 10,
            Self::MvccReadConflict => 11,
            Self::PhantomReadConflict => 12,
            Self::ExpiredChaincode => 14,
            Self::InvalidOtherReason => 255,
        }
    }

    /// Symbolic name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::NilEnvelope => "NIL_ENVELOPE",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::BadCommonHeader => "BAD_COMMON_HEADER",
            Self::BadCreatorSignature => "BAD_CREATOR_SIGNATURE",
            Self::InvalidEndorserTransaction => "INVALID_ENDORSER_TRANSACTION",
            Self::BadProposalTxid => "BAD_PROPOSAL_TXID",
            Self::DuplicateTxid => "DUPLICATE_TXID",
            Self::EndorsementPolicyFailure => "ENDORSEMENT_POLICY_FAILURE",
            Self::MvccReadConflict => "MVCC_READ_CONFLICT",
            Self::PhantomReadConflict => "PHANTOM_READ_CONFLICT",
            Self::ExpiredChaincode => "EXPIRED_CHAINCODE",
            Self::InvalidOtherReason => "INVALID_OTHER_REASON",
        }
    }

    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status carried by an orderer's broadcast acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Success,
    BadRequest,
    Forbidden,
    NotFound,
    RequestEntityTooLarge,
    InternalServerError,
    ServiceUnavailable,
}

impl BroadcastStatus {
    /// HTTP-style numeric status.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RequestEntityTooLarge => 413,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::BadRequest => "BAD_REQUEST",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::RequestEntityTooLarge => "REQUEST_ENTITY_TOO_LARGE",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
