//! Shared setup for gateway tests.

#![allow(dead_code)]

use ledgergate_commit::{BlockCommit, CommitEventSupplier, SupplierError};
use ledgergate_core::{EndpointConfig, EndpointError, Proposal, SignedProposal, ValidationCode};
use ledgergate_registry::mock::{
    orderer_config, EndpointDefinition, MockDiscovery, MockEndorser, MockEndpointFactory,
};
use ledgergate_registry::LocalEndorser;
use ledgergate_server::{Code, Gateway, GatewayError, GatewayOptions, GatewayParts};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const TEST_CHANNEL: &str = "test_channel";
pub const TEST_CHAINCODE: &str = "test_chaincode";

pub const MEMBERS: &[(&str, &str, &str)] = &[
    ("id1", "localhost:7051", "msp1"),
    ("id2", "peer1:8051", "msp1"),
    ("id3", "peer2:9051", "msp1"),
];

/// Commit streams handed to the gateway, one per channel.
#[derive(Default)]
pub struct CommitFeed {
    senders: Mutex<HashMap<String, mpsc::Sender<BlockCommit>>>,
}

impl CommitFeed {
    /// Publish `commit` on `channel` once the gateway has subscribed to it.
    pub async fn publish(&self, channel: &str, commit: BlockCommit) {
        let sender = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(sender) = self.senders.lock().get(channel).cloned() {
                    return sender;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("gateway never subscribed to the channel");

        sender.send(commit).await.unwrap();
    }
}

impl CommitEventSupplier for CommitFeed {
    fn commit_notifications(
        &self,
        _done: CancellationToken,
        channel_id: &str,
    ) -> Result<mpsc::Receiver<BlockCommit>, SupplierError> {
        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().insert(channel_id.to_string(), tx);
        Ok(rx)
    }
}

/// One test setup: the endorsement plan, endpoint behavior and orderers.
pub struct Scenario {
    pub plan: Vec<(&'static str, Vec<&'static str>)>,
    pub definition: EndpointDefinition,
    /// Payload returned by the gateway's own peer.
    pub local_response: &'static str,
    pub orderers: Vec<(&'static str, &'static str, u16)>,
    pub options: GatewayOptions,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            plan: vec![("g1", vec!["localhost:7051"])],
            definition: EndpointDefinition::default(),
            local_response: "mock_response",
            orderers: vec![("msp1", "orderer", 7050)],
            options: GatewayOptions::default(),
        }
    }
}

pub struct Prepared {
    pub gateway: Arc<Gateway>,
    pub discovery: Arc<MockDiscovery>,
    pub factory: Arc<MockEndpointFactory>,
    pub local: Arc<MockEndorser>,
    pub commits: Arc<CommitFeed>,
    pub proposal: Proposal,
    pub signed_proposal: SignedProposal,
}

pub fn prepare(scenario: Scenario) -> Prepared {
    let local = Arc::new(match &scenario.definition.proposal_error {
        Some(message) => MockEndorser::failing(message),
        None => MockEndorser::responding(scenario.local_response),
    });

    let plan: Vec<(&str, &[&str])> = scenario
        .plan
        .iter()
        .map(|(group, peers)| (*group, peers.as_slice()))
        .collect();
    let discovery = Arc::new(
        MockDiscovery::new(MEMBERS)
            .with_plan(&plan)
            .with_config(orderer_config(&scenario.orderers)),
    );
    let factory = Arc::new(MockEndpointFactory::with_definition(scenario.definition));
    let commits = Arc::new(CommitFeed::default());

    let gateway = Arc::new(Gateway::new(
        GatewayParts {
            local: LocalEndorser {
                endpoint: EndpointConfig::new("localhost:7051", "msp1"),
                client: local.clone(),
            },
            discovery: discovery.clone(),
            endpoint_factory: factory.clone(),
            commit_supplier: commits.clone(),
        },
        scenario.options,
    ));

    let proposal = Proposal::new(TEST_CHANNEL, TEST_CHAINCODE, b"client".to_vec(), vec![]);
    let signed_proposal = proposal.signed(b"my_signature".to_vec()).unwrap();

    Prepared {
        gateway,
        discovery,
        factory,
        local,
        commits,
        proposal,
        signed_proposal,
    }
}

pub fn detail(address: &str, msp_id: &str, message: &str) -> EndpointError {
    EndpointConfig::new(address, msp_id).error(message)
}

pub fn check_error(err: &GatewayError, code: Code, message: &str, details: &[EndpointError]) {
    assert_eq!(err.code(), code, "unexpected code for {err}");
    assert!(
        err.to_string().contains(message),
        "{err:?} does not contain {message:?}"
    );
    assert_eq!(err.details(), details);
}

pub fn valid_commit(block_number: u64, transaction_id: &str) -> BlockCommit {
    BlockCommit::new(block_number).with_transaction(transaction_id, ValidationCode::Valid)
}
