//! Connection registry.
//!
//! Holds one client per remote address for the lifetime of the process.
//! Each address gets its own once-cell, so concurrent callers for the same
//! address share a single dial while the map lock is only held to look the
//! cell up.

use crate::client::{EndorserClient, EndpointFactory, OrdererClient, TransportError};
use ledgergate_core::{EndpointConfig, ProposalResponse, SignedProposal};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

/// A remote endpoint could not be reached.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("failed to create new connection: {0}")]
    Dial(#[source] TransportError),

    #[error("failed to create new connection: timed out after {0:?}")]
    Timeout(Duration),
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Upper bound on establishing one connection.
    pub dial_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(120),
        }
    }
}

/// The gateway's own peer, reached without a network hop.
#[derive(Clone)]
pub struct LocalEndorser {
    pub endpoint: EndpointConfig,
    pub client: Arc<dyn EndorserClient>,
}

/// An endorsing peer ready to receive proposals.
#[derive(Clone)]
pub struct Endorser {
    pub endpoint: EndpointConfig,
    client: Arc<dyn EndorserClient>,
}

impl Endorser {
    pub async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError> {
        self.client.process_proposal(proposal).await
    }
}

/// An orderer ready to accept broadcasts.
#[derive(Clone)]
pub struct Orderer {
    pub endpoint: EndpointConfig,
    pub client: Arc<dyn OrdererClient>,
}

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Process-wide cache of peer and orderer clients.
pub struct ConnectionRegistry {
    local: LocalEndorser,
    factory: Arc<dyn EndpointFactory>,
    options: RegistryOptions,
    endorsers: Mutex<HashMap<String, Slot<dyn EndorserClient>>>,
    orderers: Mutex<HashMap<String, Slot<dyn OrdererClient>>>,
}

impl ConnectionRegistry {
    pub fn new(
        local: LocalEndorser,
        factory: Arc<dyn EndpointFactory>,
        options: RegistryOptions,
    ) -> Self {
        Self {
            local,
            factory,
            options,
            endorsers: Mutex::new(HashMap::new()),
            orderers: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `address` is the gateway's own peer.
    pub fn is_local(&self, address: &str) -> bool {
        self.local.endpoint.address == address
    }

    /// Client for an endorsing peer: the in-process one for the local peer,
    /// otherwise a cached or freshly dialed connection.
    pub async fn endorser(&self, endpoint: &EndpointConfig) -> Result<Endorser, ConnectionError> {
        if self.is_local(&endpoint.address) {
            return Ok(Endorser {
                endpoint: endpoint.clone(),
                client: self.local.client.clone(),
            });
        }

        let slot = slot(&self.endorsers, &endpoint.address);
        let client = slot
            .get_or_try_init(|| {
                self.dial(endpoint, self.factory.connect_endorser(&endpoint.address))
            })
            .await?
            .clone();

        Ok(Endorser {
            endpoint: endpoint.clone(),
            client,
        })
    }

    /// Client for an orderer, dialed with the owning MSP's TLS roots.
    pub async fn orderer(
        &self,
        endpoint: &EndpointConfig,
        tls_root_certs: &[Vec<u8>],
    ) -> Result<Orderer, ConnectionError> {
        let slot = slot(&self.orderers, &endpoint.address);
        let client = slot
            .get_or_try_init(|| {
                self.dial(
                    endpoint,
                    self.factory
                        .connect_orderer(&endpoint.address, tls_root_certs),
                )
            })
            .await?
            .clone();

        Ok(Orderer {
            endpoint: endpoint.clone(),
            client,
        })
    }

    async fn dial<T>(
        &self,
        endpoint: &EndpointConfig,
        connect: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, ConnectionError> {
        tracing::debug!(endpoint = %endpoint.address, msp_id = %endpoint.msp_id, "dialing");

        let result = match tokio::time::timeout(self.options.dial_timeout, connect).await {
            Ok(result) => result.map_err(ConnectionError::Dial),
            Err(_) => Err(ConnectionError::Timeout(self.options.dial_timeout)),
        };

        if let Err(err) = &result {
            tracing::warn!(endpoint = %endpoint.address, error = %err, "dial failed");
        }
        result
    }

    /// Number of established remote connections.
    pub fn connection_count(&self) -> usize {
        let endorsers = self
            .endorsers
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count();
        let orderers = self
            .orderers
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count();
        endorsers + orderers
    }
}

fn slot<T: ?Sized>(slots: &Mutex<HashMap<String, Slot<T>>>, address: &str) -> Slot<T> {
    slots.lock().entry(address.to_string()).or_default().clone()
}
