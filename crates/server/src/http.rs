//! JSON over HTTP surface.
//!
//! Byte fields travel as hex strings. Malformed bodies are rejected with the
//! same error body as every other failure. A request is cancelled when its
//! connection goes away, which also releases any pending commit wait.

use crate::error::{GatewayError, Result};
use crate::gateway::{
    CommitStatusRequest, CommitStatusResponse, EndorseRequest, EvaluateRequest, Gateway,
    SubmitRequest, SubmitResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use ledgergate_core::{Envelope, Response, SignedProposal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Build the gateway router.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/evaluate", post(evaluate))
        .route("/endorse", post(endorse))
        .route("/submit", post(submit))
        .route("/commit-status", post(commit_status))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|err| GatewayError::invalid(format!("invalid hex in {field}: {err}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedProposalBody {
    pub proposal_bytes: String,
    #[serde(default)]
    pub signature: String,
}

impl SignedProposalBody {
    pub fn encode(proposal: &SignedProposal) -> Self {
        Self {
            proposal_bytes: hex::encode(&proposal.proposal_bytes),
            signature: hex::encode(&proposal.signature),
        }
    }

    fn decode(&self) -> Result<SignedProposal> {
        Ok(SignedProposal {
            proposal_bytes: decode_hex("proposal_bytes", &self.proposal_bytes)?,
            signature: decode_hex("signature", &self.signature)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub payload: String,
    #[serde(default)]
    pub signature: String,
}

impl EnvelopeBody {
    pub fn encode(envelope: &Envelope) -> Self {
        Self {
            payload: hex::encode(&envelope.payload),
            signature: hex::encode(&envelope.signature),
        }
    }

    fn decode(&self) -> Result<Envelope> {
        Ok(Envelope {
            payload: decode_hex("payload", &self.payload)?,
            signature: decode_hex("signature", &self.signature)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub status: i32,
    pub message: String,
    /// Hex-encoded chaincode payload.
    pub payload: String,
}

impl From<Response> for ResponseBody {
    fn from(response: Response) -> Self {
        Self {
            status: response.status,
            message: response.message,
            payload: hex::encode(response.payload),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalBody {
    pub proposed_transaction: Option<SignedProposalBody>,
}

impl ProposalBody {
    fn decode(&self) -> Result<Option<SignedProposal>> {
        self.proposed_transaction
            .as_ref()
            .map(SignedProposalBody::decode)
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateReply {
    pub result: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndorseReply {
    pub prepared_transaction: EnvelopeBody,
    pub result: ResponseBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitBody {
    pub transaction_id: String,
    pub channel_id: String,
    pub prepared_transaction: Option<EnvelopeBody>,
}

async fn evaluate(
    State(gateway): State<Arc<Gateway>>,
    body: std::result::Result<Json<ProposalBody>, JsonRejection>,
) -> Result<Json<EvaluateReply>> {
    let Json(body) = body?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let request = EvaluateRequest {
        proposed_transaction: body.decode()?,
    };
    let response = gateway.evaluate(Some(request), &cancel).await?;

    Ok(Json(EvaluateReply {
        result: response.result.into(),
    }))
}

async fn endorse(
    State(gateway): State<Arc<Gateway>>,
    body: std::result::Result<Json<ProposalBody>, JsonRejection>,
) -> Result<Json<EndorseReply>> {
    let Json(body) = body?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let request = EndorseRequest {
        proposed_transaction: body.decode()?,
    };
    let response = gateway.endorse(Some(request), &cancel).await?;

    Ok(Json(EndorseReply {
        prepared_transaction: EnvelopeBody::encode(&response.prepared_transaction),
        result: response.result.into(),
    }))
}

async fn submit(
    State(gateway): State<Arc<Gateway>>,
    body: std::result::Result<Json<SubmitBody>, JsonRejection>,
) -> Result<Json<SubmitResponse>> {
    let Json(body) = body?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let request = SubmitRequest {
        prepared_transaction: body
            .prepared_transaction
            .as_ref()
            .map(EnvelopeBody::decode)
            .transpose()?,
        transaction_id: body.transaction_id,
        channel_id: body.channel_id,
    };

    Ok(Json(gateway.submit(Some(request), &cancel).await?))
}

async fn commit_status(
    State(gateway): State<Arc<Gateway>>,
    request: std::result::Result<Json<CommitStatusRequest>, JsonRejection>,
) -> Result<Json<CommitStatusResponse>> {
    let Json(request) = request?;
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    Ok(Json(gateway.commit_status(Some(request), &cancel).await?))
}
