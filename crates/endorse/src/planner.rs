//! Endorsement planning.
//!
//! Turns a discovery descriptor into the concrete list of peers a proposal
//! is sent to.

use ledgergate_core::EndpointConfig;
use ledgergate_registry::{ChaincodeInterest, Discovery, DiscoveryError, Layout};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while planning an endorsement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("no endorsing peers")]
    NoEndorsers,
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Live candidates per group, plus the layouts to choose from.
struct Candidates {
    groups: BTreeMap<String, Vec<EndpointConfig>>,
    layouts: Vec<Layout>,
}

impl Candidates {
    /// Peers satisfying `layout`, or `None` if some group is short.
    ///
    /// Each group takes `quantity` distinct peers not already chosen for an
    /// earlier group.
    fn select(&self, layout: &Layout) -> Option<Vec<EndpointConfig>> {
        let mut chosen: Vec<EndpointConfig> = Vec::new();

        for (group, &quantity) in &layout.quantities_by_group {
            let needed = quantity as usize;
            let candidates = self.groups.get(group).map(Vec::as_slice).unwrap_or_default();

            let picked: Vec<EndpointConfig> = candidates
                .iter()
                .filter(|c| !chosen.contains(c))
                .take(needed)
                .cloned()
                .collect();
            if picked.len() < needed {
                return None;
            }
            chosen.extend(picked);
        }

        Some(chosen)
    }

    /// First layout that yields a non-empty selection.
    fn first_satisfiable(&self) -> Option<Vec<EndpointConfig>> {
        self.layouts
            .iter()
            .filter_map(|layout| self.select(layout))
            .find(|plan| !plan.is_empty())
    }

    fn contains(&self, address: &str) -> bool {
        self.groups
            .values()
            .flatten()
            .any(|endpoint| endpoint.address == address)
    }
}

/// Chooses endorsing peers from the network's view of a chaincode's policy.
pub struct EndorsementPlanner {
    discovery: Arc<dyn Discovery>,
    local: EndpointConfig,
}

impl EndorsementPlanner {
    /// `local` is the gateway's own peer, preferred whenever it qualifies.
    pub fn new(discovery: Arc<dyn Discovery>, local: EndpointConfig) -> Self {
        Self { discovery, local }
    }

    /// Peers whose endorsements together satisfy the policy of `chaincode`.
    pub fn plan_endorsement(&self, channel: &str, chaincode: &str) -> Result<Vec<EndpointConfig>> {
        let candidates = self.candidates(channel, chaincode)?;
        let plan = candidates.first_satisfiable().ok_or(PlanError::NoEndorsers)?;

        tracing::debug!(
            channel,
            chaincode,
            endorsers = plan.len(),
            "planned endorsement"
        );
        Ok(plan)
    }

    /// The single peer to evaluate `chaincode` on: the local peer when it is
    /// a candidate, otherwise the first peer of the endorsement plan.
    pub fn plan_evaluation(&self, channel: &str, chaincode: &str) -> Result<EndpointConfig> {
        let candidates = self.candidates(channel, chaincode)?;
        let plan = candidates.first_satisfiable().ok_or(PlanError::NoEndorsers)?;

        let target = if candidates.contains(&self.local.address) {
            self.local.clone()
        } else {
            plan.into_iter().next().ok_or(PlanError::NoEndorsers)?
        };

        tracing::debug!(channel, chaincode, endpoint = %target.address, "planned evaluation");
        Ok(target)
    }

    fn candidates(&self, channel: &str, chaincode: &str) -> Result<Candidates> {
        let interest = ChaincodeInterest::for_chaincode(chaincode);
        let descriptor = self.discovery.peers_for_endorsement(channel, &interest)?;
        let members = self.discovery.peers_of_channel(channel)?;

        let live: HashMap<&[u8], &str> = members
            .iter()
            .map(|member| (member.pki_id.as_slice(), member.endpoint.as_str()))
            .collect();
        let organizations: HashMap<Vec<u8>, String> = self
            .discovery
            .identity_info()
            .into_iter()
            .map(|info| (info.pki_id, info.organization))
            .collect();

        let mut groups = BTreeMap::new();
        for (group, peers) in &descriptor.endorsers_by_groups {
            // Keep live peers with a known organization, in discovery order
            let mut endpoints: Vec<EndpointConfig> = peers
                .iter()
                .filter_map(|peer| {
                    let endpoint = live.get(peer.pki_id.as_slice())?;
                    let msp_id = organizations.get(&peer.pki_id)?;
                    Some(EndpointConfig::new(*endpoint, msp_id.as_str()))
                })
                .collect();

            // Local peer first
            if let Some(pos) = endpoints
                .iter()
                .position(|endpoint| endpoint.address == self.local.address)
            {
                let local = endpoints.remove(pos);
                endpoints.insert(0, local);
            }

            groups.insert(group.clone(), endpoints);
        }

        Ok(Candidates {
            groups,
            layouts: descriptor.layouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgergate_registry::mock::MockDiscovery;
    use ledgergate_registry::EndorsementDescriptor;

    const MEMBERS: &[(&str, &str, &str)] = &[
        ("id1", "localhost:7051", "msp1"),
        ("id2", "peer1:8051", "msp1"),
        ("id3", "peer2:9051", "msp2"),
        ("id4", "peer3:10051", "msp2"),
    ];

    fn planner(discovery: MockDiscovery) -> EndorsementPlanner {
        EndorsementPlanner::new(
            Arc::new(discovery),
            EndpointConfig::new("localhost:7051", "msp1"),
        )
    }

    fn addresses(plan: &[EndpointConfig]) -> Vec<&str> {
        plan.iter().map(|e| e.address.as_str()).collect()
    }

    /// Descriptor with `groups` and the given layouts.
    fn descriptor(
        discovery: &MockDiscovery,
        groups: &[(&str, &[&str])],
        layouts: &[&[(&str, u32)]],
    ) -> EndorsementDescriptor {
        EndorsementDescriptor {
            chaincode: "test_chaincode".into(),
            endorsers_by_groups: groups
                .iter()
                .map(|(group, endpoints)| {
                    let peers = endpoints.iter().map(|e| discovery.peer(e)).collect();
                    (group.to_string(), peers)
                })
                .collect(),
            layouts: layouts
                .iter()
                .map(|quantities| Layout {
                    quantities_by_group: quantities
                        .iter()
                        .map(|(group, n)| (group.to_string(), *n))
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_one_peer_per_group() {
        let discovery =
            MockDiscovery::new(MEMBERS).with_plan(&[("g1", &["peer1:8051"]), ("g2", &["peer2:9051"])]);

        let plan = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(addresses(&plan), vec!["peer1:8051", "peer2:9051"]);
        assert_eq!(plan[1].msp_id, "msp2");
    }

    #[test]
    fn test_local_peer_preferred() {
        let discovery =
            MockDiscovery::new(MEMBERS).with_plan(&[("g1", &["peer1:8051", "localhost:7051"])]);

        let plan = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(addresses(&plan), vec!["localhost:7051"]);
    }

    #[test]
    fn test_first_candidates_in_discovery_order() {
        let discovery = MockDiscovery::new(MEMBERS);
        let descriptor = descriptor(
            &discovery,
            &[("g1", &["peer3:10051", "peer2:9051", "peer1:8051"])],
            &[&[("g1", 2)]],
        );

        let plan = planner(discovery.with_descriptor(descriptor))
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(addresses(&plan), vec!["peer3:10051", "peer2:9051"]);
    }

    #[test]
    fn test_dead_peers_skipped() {
        let discovery =
            MockDiscovery::new(MEMBERS).with_plan(&[("g1", &["gone:7051", "peer1:8051"])]);

        let plan = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(addresses(&plan), vec!["peer1:8051"]);
    }

    #[test]
    fn test_group_without_live_peers() {
        let discovery = MockDiscovery::new(MEMBERS)
            .with_plan(&[("g1", &["peer1:8051"]), ("g2", &["gone:7051"])]);

        let err = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap_err();

        assert_eq!(err, PlanError::NoEndorsers);
        assert_eq!(err.to_string(), "no endorsing peers");
    }

    #[test]
    fn test_empty_plan() {
        let discovery = MockDiscovery::new(MEMBERS).with_plan(&[]);
        let planner = planner(discovery);

        assert_eq!(
            planner.plan_endorsement("test_channel", "test_chaincode"),
            Err(PlanError::NoEndorsers)
        );
        assert_eq!(
            planner.plan_evaluation("test_channel", "test_chaincode"),
            Err(PlanError::NoEndorsers)
        );
    }

    #[test]
    fn test_peer_shared_between_groups_endorses_once() {
        let discovery = MockDiscovery::new(MEMBERS)
            .with_plan(&[("g1", &["peer1:8051"]), ("g2", &["peer1:8051", "peer2:9051"])]);

        let plan = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(addresses(&plan), vec!["peer1:8051", "peer2:9051"]);
    }

    #[test]
    fn test_single_peer_cannot_fill_two_groups() {
        let discovery = MockDiscovery::new(MEMBERS)
            .with_plan(&[("g1", &["peer1:8051"]), ("g2", &["peer1:8051"])]);

        let err = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap_err();

        assert_eq!(err, PlanError::NoEndorsers);
    }

    #[test]
    fn test_falls_back_to_next_layout() {
        let discovery = MockDiscovery::new(MEMBERS);
        let descriptor = descriptor(
            &discovery,
            &[("g1", &["peer1:8051"]), ("g2", &["peer2:9051", "peer3:10051"])],
            &[&[("g1", 2)], &[("g1", 1), ("g2", 2)]],
        );

        let plan = planner(discovery.with_descriptor(descriptor))
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(
            addresses(&plan),
            vec!["peer1:8051", "peer2:9051", "peer3:10051"]
        );
    }

    #[test]
    fn test_discovery_error_verbatim() {
        let discovery = MockDiscovery::new(MEMBERS).with_plan(&[("g1", &["peer1:8051"])]);
        discovery.fail_endorsement_query("mango-tango");

        let err = planner(discovery)
            .plan_endorsement("test_channel", "test_chaincode")
            .unwrap_err();

        assert_eq!(err.to_string(), "mango-tango");
    }

    #[test]
    fn test_membership_error_verbatim() {
        let discovery = MockDiscovery::new(MEMBERS).with_plan(&[("g1", &["peer1:8051"])]);
        discovery.fail_membership("channel not found");

        let err = planner(discovery)
            .plan_evaluation("test_channel", "test_chaincode")
            .unwrap_err();

        assert_eq!(err, PlanError::Discovery(DiscoveryError("channel not found".into())));
    }

    #[test]
    fn test_evaluation_prefers_local_peer() {
        let discovery = MockDiscovery::new(MEMBERS)
            .with_plan(&[("g1", &["peer1:8051"]), ("g2", &["localhost:7051"])]);

        let target = planner(discovery)
            .plan_evaluation("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(target, EndpointConfig::new("localhost:7051", "msp1"));
    }

    #[test]
    fn test_evaluation_without_local_peer() {
        let discovery = MockDiscovery::new(MEMBERS)
            .with_plan(&[("g1", &["peer2:9051", "peer1:8051"])]);

        let target = planner(discovery)
            .plan_evaluation("test_channel", "test_chaincode")
            .unwrap();

        assert_eq!(target, EndpointConfig::new("peer2:9051", "msp2"));
    }
}
