//! Concurrent proposal dispatch.

use futures::future::join_all;
use ledgergate_core::{EndpointConfig, EndpointError, ProposalResponse, SignedProposal, STATUS_OK};
use ledgergate_registry::{ConnectionError, ConnectionRegistry, TransportError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Why a peer did not endorse.
#[derive(Debug, Clone, Error)]
pub enum OutcomeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Rpc(TransportError),

    #[error("error {status}, {message}")]
    Application { status: i32, message: String },

    #[error("timed out after {0:?} waiting for proposal response")]
    Timeout(Duration),
}

impl OutcomeError {
    /// The peer answered, but the chaincode reported a failure.
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

/// Result of sending a proposal to one peer.
#[derive(Debug, Clone)]
pub struct ProposalOutcome {
    pub endpoint: EndpointConfig,
    pub result: Result<ProposalResponse, OutcomeError>,
}

impl ProposalOutcome {
    /// Per-endpoint detail for a failed outcome.
    pub fn detail(&self) -> Option<EndpointError> {
        self.result
            .as_ref()
            .err()
            .map(|err| self.endpoint.error(err.to_string()))
    }
}

/// Sends a signed proposal to a set of peers and gathers every outcome.
#[derive(Debug, Clone)]
pub struct ProposalCollector {
    timeout: Duration,
}

impl ProposalCollector {
    /// `timeout` bounds the whole collection, shared by every peer.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Dispatch `proposal` to all `endorsers` at once. Outcomes are returned
    /// in `endorsers` order, one per peer. Nothing is retried.
    pub async fn collect(
        &self,
        registry: &ConnectionRegistry,
        endorsers: &[EndpointConfig],
        proposal: &SignedProposal,
    ) -> Vec<ProposalOutcome> {
        let deadline = Instant::now() + self.timeout;

        join_all(
            endorsers
                .iter()
                .map(|endpoint| self.dispatch(registry, endpoint, proposal, deadline)),
        )
        .await
    }

    async fn dispatch(
        &self,
        registry: &ConnectionRegistry,
        endpoint: &EndpointConfig,
        proposal: &SignedProposal,
        deadline: Instant,
    ) -> ProposalOutcome {
        let result = match tokio::time::timeout_at(deadline, request(registry, endpoint, proposal))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(OutcomeError::Timeout(self.timeout)),
        };

        match &result {
            Ok(_) => tracing::debug!(endpoint = %endpoint.address, "proposal endorsed"),
            Err(err) => tracing::warn!(
                endpoint = %endpoint.address,
                msp_id = %endpoint.msp_id,
                error = %err,
                "proposal not endorsed"
            ),
        }

        ProposalOutcome {
            endpoint: endpoint.clone(),
            result,
        }
    }
}

async fn request(
    registry: &ConnectionRegistry,
    endpoint: &EndpointConfig,
    proposal: &SignedProposal,
) -> Result<ProposalResponse, OutcomeError> {
    let endorser = registry.endorser(endpoint).await?;
    let response = endorser
        .process_proposal(proposal)
        .await
        .map_err(OutcomeError::Rpc)?;

    if response.response.status != STATUS_OK {
        return Err(OutcomeError::Application {
            status: response.response.status,
            message: response.response.message,
        });
    }

    Ok(response)
}
