// crates/leader-election-core/src/coordinator/topology_builder.rs
//! Drives `ips;`/`discover;` distribution over the pure neighbor-list
//! functions in `crate::topology` (spec.md Sec. 4.3). Sent twice (general
//! topology: once, via `discover;`) at ~1 ms pacing to mask occasional
//! datagram loss, as the teacher's `build_soa_ident_request` polling loop
//! paces identification requests one node at a time.

use super::state::{CoordinatorConfig, CoordinatorPhase, CoordinatorState};
use crate::coordinator::discovery::CoordinatorAction;
use crate::frame::codec::Frame;
use crate::types::Topology;
use alloc::vec::Vec;
use log::info;

/// How many times each node's topology frame is (re-)sent to mask loss
/// (spec.md Sec. 4.3: "twice ... three times for some topologies").
const TOPOLOGY_SEND_ROUNDS: u32 = 2;

/// Builds the full set of actions distributing topology information to
/// every discovered node, called once on entering `DistributingTopology`.
pub fn distribute_topology(state: &mut CoordinatorState, cfg: &CoordinatorConfig) -> Vec<CoordinatorAction> {
    let ids: Vec<_> = state.nodes.iter().map(|n| n.id.clone()).collect();
    info!(
        "[coordinator] distributing {:?} topology to {} node(s)",
        cfg.topology,
        ids.len()
    );

    let mut actions = Vec::new();
    if cfg.topology == Topology::General {
        for _ in 0..TOPOLOGY_SEND_ROUNDS {
            for id in &ids {
                actions.push(CoordinatorAction::SendUnicast(id.clone(), Frame::Discover));
            }
        }
    } else {
        let table = crate::topology::build_topology(cfg.topology, &ids);
        for _ in 0..TOPOLOGY_SEND_ROUNDS {
            for (id, neighbors) in ids.iter().zip(table.iter()) {
                actions.push(CoordinatorAction::SendUnicast(
                    id.clone(),
                    Frame::Ips {
                        neighbors: neighbors.clone(),
                    },
                ));
            }
        }
    }

    state.phase = CoordinatorPhase::Starting;
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::state::NodeRecord;
    use crate::types::{ElectionValue, NodeId};

    fn setup(topology: Topology) -> CoordinatorState {
        let cfg = CoordinatorConfig::new(topology);
        let mut s = CoordinatorState::new(&cfg);
        for short in ["a", "b", "c"] {
            s.nodes.push(NodeRecord::new(NodeId::from_short(short), ElectionValue::new(10).unwrap()));
        }
        s
    }

    #[test]
    fn ring_topology_sends_ips_twice_per_node() {
        let mut s = setup(Topology::Ring);
        let cfg = CoordinatorConfig::new(Topology::Ring);
        let actions = distribute_topology(&mut s, &cfg);
        assert_eq!(actions.len(), 6);
        assert_eq!(s.phase, CoordinatorPhase::Starting);
    }

    #[test]
    fn general_topology_sends_discover_instead_of_ips() {
        let mut s = setup(Topology::General);
        let cfg = CoordinatorConfig::new(Topology::General);
        let actions = distribute_topology(&mut s, &cfg);
        assert!(actions
            .iter()
            .all(|a| matches!(a, CoordinatorAction::SendUnicast(_, Frame::Discover))));
    }
}
