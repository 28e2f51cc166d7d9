//! Delivery of signed envelopes to the ordering service.

use ledgergate_core::{BroadcastStatus, EndpointConfig, EndpointError, Envelope};
use ledgergate_registry::{
    BroadcastResponse, ConnectionError, ConnectionRegistry, Discovery, DiscoveryError,
    TransportError,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while broadcasting a transaction.
#[derive(Debug, Clone, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no broadcastClients discovered")]
    NoOrderers,

    #[error("{source}")]
    Connection {
        endpoint: EndpointConfig,
        #[source]
        source: ConnectionError,
    },

    #[error("failed to send transaction to orderer")]
    Send {
        endpoint: EndpointConfig,
        #[source]
        cause: TransportError,
    },

    #[error("failed to receive response from orderer")]
    Receive {
        endpoint: EndpointConfig,
        #[source]
        cause: TransportError,
    },

    #[error("received nil response from orderer")]
    NilResponse { endpoint: EndpointConfig },

    #[error("received unsuccessful response from orderer: {status}")]
    Unsuccessful {
        endpoint: EndpointConfig,
        status: BroadcastStatus,
        info: String,
    },
}

impl BroadcastError {
    /// The orderer at fault, if one was reached.
    pub fn endpoint(&self) -> Option<&EndpointConfig> {
        match self {
            Self::Discovery(_) | Self::NoOrderers => None,
            Self::Connection { endpoint, .. }
            | Self::Send { endpoint, .. }
            | Self::Receive { endpoint, .. }
            | Self::NilResponse { endpoint }
            | Self::Unsuccessful { endpoint, .. } => Some(endpoint),
        }
    }

    /// Structured detail naming the orderer and what it reported.
    pub fn endpoint_detail(&self) -> Option<EndpointError> {
        let message = match self {
            Self::Send { cause, .. } | Self::Receive { cause, .. } => cause.to_string(),
            other => other.to_string(),
        };
        self.endpoint().map(|endpoint| endpoint.error(message))
    }
}

pub type Result<T> = std::result::Result<T, BroadcastError>;

/// An orderer endpoint and the TLS roots of the MSP that runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdererTarget {
    pub endpoint: EndpointConfig,
    pub tls_root_certs: Vec<Vec<u8>>,
}

/// Sends signed transactions to a channel's ordering service.
pub struct OrdererBroadcaster {
    discovery: Arc<dyn Discovery>,
    registry: Arc<ConnectionRegistry>,
}

impl OrdererBroadcaster {
    pub fn new(discovery: Arc<dyn Discovery>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            discovery,
            registry,
        }
    }

    /// Orderers of `channel`, grouped by MSP id in ascending order.
    pub fn orderers(&self, channel: &str) -> Result<Vec<OrdererTarget>> {
        let config = self.discovery.config(channel)?;

        let mut targets = Vec::new();
        for (msp_id, endpoints) in &config.orderers {
            let tls_root_certs = config
                .msps
                .get(msp_id)
                .map(|msp| msp.tls_root_certs.clone())
                .unwrap_or_default();

            for endpoint in endpoints {
                targets.push(OrdererTarget {
                    endpoint: EndpointConfig::new(endpoint.address(), msp_id.as_str()),
                    tls_root_certs: tls_root_certs.clone(),
                });
            }
        }

        Ok(targets)
    }

    /// Send `envelope` to the first orderer of `channel` and wait for its
    /// acknowledgement.
    pub async fn broadcast(&self, channel: &str, envelope: &Envelope) -> Result<BroadcastResponse> {
        let target = self
            .orderers(channel)?
            .into_iter()
            .next()
            .ok_or(BroadcastError::NoOrderers)?;
        let endpoint = target.endpoint;

        let orderer = self
            .registry
            .orderer(&endpoint, &target.tls_root_certs)
            .await
            .map_err(|source| BroadcastError::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;

        let send_failed = |cause| BroadcastError::Send {
            endpoint: endpoint.clone(),
            cause,
        };
        let mut stream = orderer.client.broadcast().await.map_err(send_failed)?;
        stream.send(envelope).await.map_err(send_failed)?;

        let response = stream
            .recv()
            .await
            .map_err(|cause| BroadcastError::Receive {
                endpoint: endpoint.clone(),
                cause,
            })?
            .ok_or_else(|| BroadcastError::NilResponse {
                endpoint: endpoint.clone(),
            })?;

        if !response.status.is_success() {
            return Err(BroadcastError::Unsuccessful {
                endpoint,
                status: response.status,
                info: response.info,
            });
        }

        tracing::debug!(
            channel,
            endpoint = %endpoint.address,
            msp_id = %endpoint.msp_id,
            "transaction accepted by orderer"
        );
        Ok(response)
    }
}
