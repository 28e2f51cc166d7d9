//! In-memory collaborators for tests.
//!
//! Enabled for this crate's own tests and, through the `mock` feature, for
//! dependent crates' tests.

use crate::client::{
    BroadcastResponse, BroadcastStream, EndorserClient, EndpointFactory, OrdererClient,
    TransportError,
};
use crate::discovery::{
    ChaincodeInterest, ConfigResult, Discovery, DiscoveryError, EndorsementDescriptor, Layout,
    MspConfig, NetworkMember, OrdererEndpoint, Peer, PeerIdentityInfo,
};
use async_trait::async_trait;
use ledgergate_core::{
    hash, BroadcastStatus, Endorsement, Envelope, ProposalResponse, Response, SignedProposal,
    STATUS_OK,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Discovery answering from fixed tables.
pub struct MockDiscovery {
    members: Vec<NetworkMember>,
    identities: Vec<PeerIdentityInfo>,
    descriptor: Mutex<Result<EndorsementDescriptor, DiscoveryError>>,
    membership_error: Mutex<Option<DiscoveryError>>,
    config: Mutex<Result<ConfigResult, DiscoveryError>>,
    endorsement_queries: AtomicUsize,
}

impl MockDiscovery {
    /// Channel members given as `(pki id, endpoint, msp id)`.
    pub fn new(members: &[(&str, &str, &str)]) -> Self {
        Self {
            members: members
                .iter()
                .map(|(id, endpoint, _)| NetworkMember {
                    pki_id: id.as_bytes().to_vec(),
                    endpoint: endpoint.to_string(),
                })
                .collect(),
            identities: members
                .iter()
                .map(|(id, _, msp_id)| PeerIdentityInfo {
                    pki_id: id.as_bytes().to_vec(),
                    organization: msp_id.to_string(),
                })
                .collect(),
            descriptor: Mutex::new(Ok(EndorsementDescriptor::default())),
            membership_error: Mutex::new(None),
            config: Mutex::new(Ok(ConfigResult::default())),
            endorsement_queries: AtomicUsize::new(0),
        }
    }

    /// Endorsement groups given as `(group, endpoints)`, with one layout
    /// requiring one endorsement from every group.
    pub fn with_plan(self, plan: &[(&str, &[&str])]) -> Self {
        let mut descriptor = EndorsementDescriptor {
            chaincode: "test_chaincode".to_string(),
            ..Default::default()
        };
        let mut layout = Layout::default();

        for (group, endpoints) in plan {
            let peers = endpoints.iter().map(|endpoint| self.peer(endpoint)).collect();
            descriptor.endorsers_by_groups.insert(group.to_string(), peers);
            layout.quantities_by_group.insert(group.to_string(), 1);
        }
        if !plan.is_empty() {
            descriptor.layouts.push(layout);
        }

        self.with_descriptor(descriptor)
    }

    pub fn with_descriptor(self, descriptor: EndorsementDescriptor) -> Self {
        *self.descriptor.lock() = Ok(descriptor);
        self
    }

    pub fn with_config(self, config: ConfigResult) -> Self {
        *self.config.lock() = Ok(config);
        self
    }

    /// Descriptor entry for the member at `endpoint`. Unknown endpoints get
    /// a PKI id no member carries.
    pub fn peer(&self, endpoint: &str) -> Peer {
        let pki_id = self
            .members
            .iter()
            .find(|member| member.endpoint == endpoint)
            .map(|member| member.pki_id.clone())
            .unwrap_or_else(|| format!("unknown:{endpoint}").into_bytes());

        Peer {
            pki_id,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn fail_endorsement_query(&self, message: &str) {
        *self.descriptor.lock() = Err(DiscoveryError(message.to_string()));
    }

    pub fn fail_membership(&self, message: &str) {
        *self.membership_error.lock() = Some(DiscoveryError(message.to_string()));
    }

    pub fn fail_config(&self, message: &str) {
        *self.config.lock() = Err(DiscoveryError(message.to_string()));
    }

    /// Number of endorsement descriptor lookups served.
    pub fn endorsement_queries(&self) -> usize {
        self.endorsement_queries.load(Ordering::SeqCst)
    }
}

impl Discovery for MockDiscovery {
    fn peers_for_endorsement(
        &self,
        _channel: &str,
        _interest: &ChaincodeInterest,
    ) -> Result<EndorsementDescriptor, DiscoveryError> {
        self.endorsement_queries.fetch_add(1, Ordering::SeqCst);
        self.descriptor.lock().clone()
    }

    fn peers_of_channel(&self, _channel: &str) -> Result<Vec<NetworkMember>, DiscoveryError> {
        match self.membership_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(self.members.clone()),
        }
    }

    fn identity_info(&self) -> Vec<PeerIdentityInfo> {
        self.identities.clone()
    }

    fn config(&self, _channel: &str) -> Result<ConfigResult, DiscoveryError> {
        self.config.lock().clone()
    }
}

/// Channel config with the given `(msp id, host, port)` orderers. Each MSP
/// gets the TLS root `ca-<msp id>`.
pub fn orderer_config(orderers: &[(&str, &str, u16)]) -> ConfigResult {
    let mut config = ConfigResult::default();
    for (msp_id, host, port) in orderers {
        config
            .orderers
            .entry(msp_id.to_string())
            .or_default()
            .push(OrdererEndpoint::new(*host, *port));
        config.msps.insert(
            msp_id.to_string(),
            MspConfig {
                tls_root_certs: vec![format!("ca-{msp_id}").into_bytes()],
            },
        );
    }
    config
}

/// How every endpoint created by a [`MockEndpointFactory`] behaves.
#[derive(Debug, Clone)]
pub struct EndpointDefinition {
    pub proposal_response_value: String,
    pub proposal_response_status: i32,
    pub proposal_response_message: String,
    /// Transport failure returned instead of a proposal response.
    pub proposal_error: Option<String>,
    /// Acknowledgement sent by orderers. `None` means an empty answer.
    pub orderer_response: Option<BroadcastResponse>,
    pub orderer_send_error: Option<String>,
    pub orderer_recv_error: Option<String>,
}

impl Default for EndpointDefinition {
    fn default() -> Self {
        Self {
            proposal_response_value: "mock_response".to_string(),
            proposal_response_status: STATUS_OK,
            proposal_response_message: String::new(),
            proposal_error: None,
            orderer_response: Some(BroadcastResponse {
                status: BroadcastStatus::Success,
                info: "mock_orderer_response".to_string(),
            }),
            orderer_send_error: None,
            orderer_recv_error: None,
        }
    }
}

enum Behavior {
    Respond(Response),
    Fail(String),
}

/// Endorser returning a canned response.
///
/// The signed payload hashes the incoming proposal bytes, so endorsers
/// returning the same response produce identical payloads.
pub struct MockEndorser {
    identity: Vec<u8>,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockEndorser {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            identity: b"mock_endorser".to_vec(),
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Responds with status 200 and `value` as payload.
    pub fn responding(value: &str) -> Self {
        Self::with_behavior(Behavior::Respond(Response::ok(value.as_bytes())))
    }

    /// Responds with an arbitrary application status.
    pub fn with_status(value: &str, status: i32, message: &str) -> Self {
        Self::with_behavior(Behavior::Respond(Response {
            status,
            message: message.to_string(),
            payload: value.as_bytes().to_vec(),
        }))
    }

    /// Fails every call at the transport level.
    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()))
    }

    pub fn from_definition(definition: &EndpointDefinition) -> Self {
        match &definition.proposal_error {
            Some(message) => Self::failing(message),
            None => Self::with_status(
                &definition.proposal_response_value,
                definition.proposal_response_status,
                &definition.proposal_response_message,
            ),
        }
    }

    /// Identity placed in the endorsement.
    pub fn endorsed_by(mut self, identity: &str) -> Self {
        self.identity = identity.as_bytes().to_vec();
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndorserClient for MockEndorser {
    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Fail(message) => Err(TransportError::new(message.clone())),
            Behavior::Respond(response) => ProposalResponse::new(
                hash(&proposal.proposal_bytes),
                response.clone(),
                Endorsement {
                    endorser: self.identity.clone(),
                    signature: b"endorsement_signature".to_vec(),
                },
            )
            .map_err(|err| TransportError::new(err.to_string())),
        }
    }
}

/// Orderer recording every envelope it is sent.
pub struct MockOrderer {
    send_error: Option<String>,
    recv_error: Option<String>,
    response: Option<BroadcastResponse>,
    sent: Arc<Mutex<Vec<Envelope>>>,
}

impl MockOrderer {
    /// Acknowledges every envelope with `status`.
    pub fn acknowledging(status: BroadcastStatus, info: &str) -> Self {
        Self {
            send_error: None,
            recv_error: None,
            response: Some(BroadcastResponse {
                status,
                info: info.to_string(),
            }),
            sent: Arc::default(),
        }
    }

    pub fn from_definition(definition: &EndpointDefinition) -> Self {
        Self {
            send_error: definition.orderer_send_error.clone(),
            recv_error: definition.orderer_recv_error.clone(),
            response: definition.orderer_response.clone(),
            sent: Arc::default(),
        }
    }

    /// Envelopes accepted so far.
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl OrdererClient for MockOrderer {
    async fn broadcast(&self) -> Result<Box<dyn BroadcastStream>, TransportError> {
        Ok(Box::new(MockBroadcastStream {
            send_error: self.send_error.clone(),
            recv_error: self.recv_error.clone(),
            response: self.response.clone(),
            sent: self.sent.clone(),
        }))
    }
}

struct MockBroadcastStream {
    send_error: Option<String>,
    recv_error: Option<String>,
    response: Option<BroadcastResponse>,
    sent: Arc<Mutex<Vec<Envelope>>>,
}

#[async_trait]
impl BroadcastStream for MockBroadcastStream {
    async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        if let Some(message) = &self.send_error {
            return Err(TransportError::new(message.clone()));
        }
        self.sent.lock().push(envelope.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<BroadcastResponse>, TransportError> {
        if let Some(message) = &self.recv_error {
            return Err(TransportError::new(message.clone()));
        }
        Ok(self.response.clone())
    }
}

/// Factory creating mock endpoints on demand.
#[derive(Default)]
pub struct MockEndpointFactory {
    definition: Mutex<EndpointDefinition>,
    endorsers: Mutex<HashMap<String, Arc<MockEndorser>>>,
    orderers: Mutex<HashMap<String, Arc<MockOrderer>>>,
    dial_failures: Mutex<HashMap<String, String>>,
    dials: Mutex<HashMap<String, usize>>,
    tls_roots: Mutex<BTreeMap<String, Vec<Vec<u8>>>>,
}

impl MockEndpointFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behavior of endpoints not set up explicitly.
    pub fn with_definition(definition: EndpointDefinition) -> Self {
        Self {
            definition: Mutex::new(definition),
            ..Default::default()
        }
    }

    /// Serve `address` with a specific endorser.
    pub fn set_endorser(&self, address: &str, endorser: MockEndorser) {
        self.endorsers
            .lock()
            .insert(address.to_string(), Arc::new(endorser));
    }

    /// Serve `address` with a specific orderer.
    pub fn set_orderer(&self, address: &str, orderer: MockOrderer) {
        self.orderers
            .lock()
            .insert(address.to_string(), Arc::new(orderer));
    }

    /// Make dials to `address` fail with `message`.
    pub fn fail_dial(&self, address: &str, message: &str) {
        self.dial_failures
            .lock()
            .insert(address.to_string(), message.to_string());
    }

    pub fn clear_dial_failures(&self) {
        self.dial_failures.lock().clear();
    }

    /// Dial attempts made to `address`, failed ones included.
    pub fn dial_count(&self, address: &str) -> usize {
        self.dials.lock().get(address).copied().unwrap_or(0)
    }

    /// Endorser serving `address`, once dialed or set up.
    pub fn endorser(&self, address: &str) -> Option<Arc<MockEndorser>> {
        self.endorsers.lock().get(address).cloned()
    }

    /// Orderer serving `address`, once dialed or set up.
    pub fn orderer(&self, address: &str) -> Option<Arc<MockOrderer>> {
        self.orderers.lock().get(address).cloned()
    }

    /// TLS roots the orderer at `address` was last dialed with.
    pub fn orderer_tls_roots(&self, address: &str) -> Vec<Vec<u8>> {
        self.tls_roots.lock().get(address).cloned().unwrap_or_default()
    }

    /// Proposal calls served by all dialed endorsers.
    pub fn proposal_calls(&self) -> usize {
        self.endorsers.lock().values().map(|e| e.calls()).sum()
    }

    fn record_dial(&self, address: &str) -> Result<(), TransportError> {
        *self.dials.lock().entry(address.to_string()).or_default() += 1;
        match self.dial_failures.lock().get(address) {
            Some(message) => Err(TransportError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EndpointFactory for MockEndpointFactory {
    async fn connect_endorser(
        &self,
        address: &str,
    ) -> Result<Arc<dyn EndorserClient>, TransportError> {
        self.record_dial(address)?;

        let definition = self.definition.lock().clone();
        let endorser = self
            .endorsers
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| {
                Arc::new(MockEndorser::from_definition(&definition).endorsed_by(address))
            })
            .clone();
        Ok(endorser)
    }

    async fn connect_orderer(
        &self,
        address: &str,
        tls_root_certs: &[Vec<u8>],
    ) -> Result<Arc<dyn OrdererClient>, TransportError> {
        self.record_dial(address)?;
        self.tls_roots
            .lock()
            .insert(address.to_string(), tls_root_certs.to_vec());

        let definition = self.definition.lock().clone();
        let orderer = self
            .orderers
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(MockOrderer::from_definition(&definition)))
            .clone();
        Ok(orderer)
    }
}
