//! The four client operations.
//!
//! Each call is a short pipeline over the shared components: the planner
//! and collector for Evaluate and Endorse, the broadcaster for Submit and
//! the commit notifier for CommitStatus. Request fields are validated before
//! any component runs.

use crate::error::{GatewayError, Result};
use crate::options::GatewayOptions;
use ledgergate_broadcast::OrdererBroadcaster;
use ledgergate_commit::{CommitEventSupplier, Notifier};
use ledgergate_core::{Envelope, Response, SignedProposal, ValidationCode};
use ledgergate_endorse::{
    assemble, EndorsementPlanner, OutcomeError, ProposalCollector, ProposalOutcome,
};
use ledgergate_registry::{ConnectionRegistry, Discovery, EndpointFactory, LocalEndorser};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluateRequest {
    pub proposed_transaction: Option<SignedProposal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateResponse {
    /// Response of the peer that evaluated the proposal.
    pub result: Response,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndorseRequest {
    pub proposed_transaction: Option<SignedProposal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndorseResponse {
    /// Unsigned envelope; the client signs it before submitting.
    pub prepared_transaction: Envelope,
    pub result: Response,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    pub transaction_id: String,
    /// Target channel. When empty, taken from the envelope's header.
    pub channel_id: String,
    pub prepared_transaction: Option<Envelope>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitStatusRequest {
    pub channel_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatusResponse {
    pub block_number: u64,
    pub result: ValidationCode,
}

/// Collaborators a gateway is built from.
pub struct GatewayParts {
    /// The gateway's own peer.
    pub local: LocalEndorser,
    pub discovery: Arc<dyn Discovery>,
    /// Creates clients for remote peers and orderers.
    pub endpoint_factory: Arc<dyn EndpointFactory>,
    /// Source of block commit streams.
    pub commit_supplier: Arc<dyn CommitEventSupplier>,
}

/// Client-facing transaction gateway.
pub struct Gateway {
    options: GatewayOptions,
    registry: Arc<ConnectionRegistry>,
    planner: EndorsementPlanner,
    collector: ProposalCollector,
    broadcaster: OrdererBroadcaster,
    notifier: Notifier,
}

impl Gateway {
    pub fn new(parts: GatewayParts, options: GatewayOptions) -> Self {
        let local_endpoint = parts.local.endpoint.clone();
        let registry = Arc::new(ConnectionRegistry::new(
            parts.local,
            parts.endpoint_factory,
            options.registry_options(),
        ));

        tracing::info!(
            endpoint = %local_endpoint.address,
            msp_id = %local_endpoint.msp_id,
            enabled = options.enabled,
            "gateway created"
        );

        Self {
            planner: EndorsementPlanner::new(parts.discovery.clone(), local_endpoint),
            collector: ProposalCollector::new(options.endorsement_timeout),
            broadcaster: OrdererBroadcaster::new(parts.discovery, registry.clone()),
            notifier: Notifier::new(parts.commit_supplier),
            registry,
            options,
        }
    }

    /// Run a proposal on one peer without endorsing it.
    pub async fn evaluate(
        &self,
        request: Option<EvaluateRequest>,
        cancel: &CancellationToken,
    ) -> Result<EvaluateResponse> {
        self.check_enabled()?;
        let request = request.ok_or_else(|| GatewayError::invalid("an evaluate request is required"))?;

        let signed = request.proposed_transaction.unwrap_or_default();
        let proposal = signed.unpack().map_err(|err| {
            GatewayError::invalid(format!("failed to unpack transaction proposal: {err}"))
        })?;

        let target = self
            .planner
            .plan_evaluation(proposal.channel_id(), proposal.chaincode_id())?;

        let outcomes = cancellable(
            cancel,
            self.collector
                .collect(&self.registry, std::slice::from_ref(&target), &signed),
        )
        .await?;

        let Some(outcome) = outcomes.into_iter().next() else {
            return Err(GatewayError::unavailable("no endorsing peers"));
        };
        let ProposalOutcome { endpoint, result } = outcome;
        match result {
            Ok(response) => {
                tracing::debug!(
                    txid = %proposal.transaction_id(),
                    endpoint = %endpoint.address,
                    "evaluated transaction"
                );
                Ok(EvaluateResponse {
                    result: response.response,
                })
            }
            Err(err) => {
                let details = vec![endpoint.error(err.to_string())];
                Err(match err {
                    OutcomeError::Connection(_) => GatewayError::Unavailable {
                        message: err.to_string(),
                        details,
                    },
                    OutcomeError::Application { .. } => {
                        GatewayError::aborted("transaction evaluation error", details)
                    }
                    OutcomeError::Timeout(_) => GatewayError::DeadlineExceeded {
                        message: "failed to evaluate transaction".to_string(),
                        details,
                    },
                    OutcomeError::Rpc(_) => {
                        GatewayError::aborted("failed to evaluate transaction", details)
                    }
                })
            }
        }
    }

    /// Collect endorsements for a proposal and assemble the transaction the
    /// client then signs.
    pub async fn endorse(
        &self,
        request: Option<EndorseRequest>,
        cancel: &CancellationToken,
    ) -> Result<EndorseResponse> {
        self.check_enabled()?;
        let request = request.ok_or_else(|| GatewayError::invalid("an endorse request is required"))?;

        let signed = request.proposed_transaction.ok_or_else(|| {
            GatewayError::invalid("the proposed transaction must contain a signed proposal")
        })?;
        let proposal = signed.unpack().map_err(|err| {
            GatewayError::invalid(format!("failed to unpack transaction proposal: {err}"))
        })?;

        let plan = self
            .planner
            .plan_endorsement(proposal.channel_id(), proposal.chaincode_id())?;

        let outcomes = cancellable(cancel, self.collector.collect(&self.registry, &plan, &signed)).await?;

        // Any failed endorser fails the call
        let details: Vec<_> = outcomes.iter().filter_map(ProposalOutcome::detail).collect();
        if !details.is_empty() {
            return Err(GatewayError::aborted("failed to endorse transaction", details));
        }

        let responses: Vec<_> = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.result.ok())
            .collect();
        let assembled = assemble(&proposal, &responses).map_err(|err| {
            GatewayError::aborted(format!("failed to assemble transaction: {err}"), Vec::new())
        })?;

        tracing::debug!(
            txid = %proposal.transaction_id(),
            channel = %proposal.channel_id(),
            endorsements = responses.len(),
            "endorsed transaction"
        );

        Ok(EndorseResponse {
            prepared_transaction: assembled.envelope,
            result: assembled.result,
        })
    }

    /// Send a signed transaction to the ordering service.
    pub async fn submit(
        &self,
        request: Option<SubmitRequest>,
        cancel: &CancellationToken,
    ) -> Result<SubmitResponse> {
        self.check_enabled()?;
        let request = request.ok_or_else(|| GatewayError::invalid("a submit request is required"))?;

        let envelope = request
            .prepared_transaction
            .ok_or_else(|| GatewayError::invalid("a prepared transaction is required"))?;
        if !envelope.is_signed() {
            return Err(GatewayError::invalid("prepared transaction must be signed"));
        }

        let channel_id = if request.channel_id.is_empty() {
            let payload = envelope.unpack().map_err(|err| {
                GatewayError::invalid(format!("failed to unpack prepared transaction: {err}"))
            })?;
            payload.header.channel_id
        } else {
            request.channel_id
        };
        if channel_id.is_empty() {
            return Err(GatewayError::invalid("a channel id is required"));
        }

        let response = cancellable(cancel, self.broadcaster.broadcast(&channel_id, &envelope)).await??;

        tracing::info!(
            txid = %request.transaction_id,
            channel = %channel_id,
            info = %response.info,
            "submitted transaction"
        );
        Ok(SubmitResponse {})
    }

    /// Wait for a transaction to commit and report its validation code.
    pub async fn commit_status(
        &self,
        request: Option<CommitStatusRequest>,
        cancel: &CancellationToken,
    ) -> Result<CommitStatusResponse> {
        self.check_enabled()?;
        let request =
            request.ok_or_else(|| GatewayError::invalid("a commit status request is required"))?;

        if request.channel_id.is_empty() {
            return Err(GatewayError::invalid("a channel id is required"));
        }
        if request.transaction_id.is_empty() {
            return Err(GatewayError::invalid("a transaction id is required"));
        }

        let receiver =
            self.notifier
                .notify(cancel.clone(), &request.channel_id, &request.transaction_id)?;

        let notification = cancellable(cancel, receiver.recv())
            .await?
            .ok_or_else(|| GatewayError::unavailable("commit notifier is closed"))?;

        Ok(CommitStatusResponse {
            block_number: notification.block_number,
            result: notification.validation_code,
        })
    }

    /// Stop every commit notifier. Pending commit status calls fail.
    pub fn close(&self) {
        self.notifier.close();
    }

    fn check_enabled(&self) -> Result<()> {
        if self.options.enabled {
            Ok(())
        } else {
            Err(GatewayError::unavailable("gateway is disabled"))
        }
    }
}

/// Run `future` unless the caller cancels first.
async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled("request cancelled".to_string())),
        output = future => Ok(output),
    }
}
