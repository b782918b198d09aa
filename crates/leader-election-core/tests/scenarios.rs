//! End-to-end election scenarios driven entirely through `WorkerSession`,
//! with no real sockets: an in-memory router delivers each `WorkerAction`
//! straight to the addressed peer's `process_raw_frame`. Mirrors the
//! teacher's `tests/simulator/` harness (a multi-node in-process driver
//! sitting in front of `Node::process_raw_frame`/`tick`), generalized to
//! spec.md Sec. 8's concrete end-to-end scenarios A-F.

use leader_election_core::common::MonotonicInstant;
use leader_election_core::types::{ElectionValue, NodeId, Topology};
use leader_election_core::worker::{Phase, WorkerAction, WorkerConfig, WorkerSession};
use leader_election_core::Codec;
use std::collections::HashMap;

/// A tiny in-memory fleet: one `WorkerSession` per node, keyed by short id.
/// `deliver` fans a batch of `WorkerAction`s out to their targets exactly as
/// a real transport would, except instantaneously and without loss (unless
/// `drop_every` is set).
struct Fleet {
    sessions: HashMap<String, WorkerSession>,
    order: Vec<String>,
    /// When `Some(k)`, every k-th multicast/unicast send is silently
    /// dropped (spec.md Sec. 8 "Datagram-loss simulation").
    drop_every: Option<u32>,
    sent: u32,
    /// Actions generated while delivering the current batch, drained
    /// breadth-first by `drain_pending` so a reply-to-a-reply (e.g. an
    /// immediate `le_ack` answering `le_m?`) is never lost.
    pending: Option<Vec<(String, Vec<WorkerAction>)>>,
}

impl Fleet {
    fn ring(shorts: &[&str], ms: &[u16], cfg: WorkerConfig) -> Self {
        Self::with_topology(shorts, ms, cfg, Topology::Ring)
    }

    fn with_topology(shorts: &[&str], ms: &[u16], cfg: WorkerConfig, topology: Topology) -> Self {
        let ids: Vec<NodeId> = shorts.iter().map(|s| NodeId::from_short(s)).collect();
        let table = leader_election_core::topology::build_topology(topology, &ids);

        let mut sessions = HashMap::new();
        for (i, short) in shorts.iter().enumerate() {
            let mut session = WorkerSession::new(NodeId::from_short(short), cfg);
            session.state.my_m = ElectionValue::new(ms[i]).unwrap();
            session.state.leader = session.state.my_id.clone();
            session.state.local_min = session.state.my_m;
            session.state.phase = Phase::TopologyKnown;
            for n in &table[i] {
                session
                    .state
                    .neighbors
                    .push(leader_election_core::worker::NeighborEntry::new(n.clone()));
            }
            sessions.insert((*short).to_string(), session);
        }
        Self {
            sessions,
            order: shorts.iter().map(|s| s.to_string()).collect(),
            drop_every: None,
            sent: 0,
            pending: None,
        }
    }

    fn with_loss(mut self, k: u32) -> Self {
        self.drop_every = Some(k);
        self
    }

    fn start_all(&mut self, now: MonotonicInstant) {
        let order = self.order.clone();
        let mut outbox: Vec<(String, Vec<WorkerAction>)> = Vec::new();
        for short in &order {
            let session = self.sessions.get_mut(short).unwrap();
            let bytes = leader_election_core::frame::codec::Frame::Start.encode().unwrap();
            let actions = session
                .process_raw_frame(session.state.my_id.clone(), &bytes, now)
                .unwrap();
            outbox.push((short.clone(), actions));
        }
        for (sender, actions) in outbox {
            self.deliver(&sender, actions);
        }
        self.drain_pending();
    }

    fn deliver(&mut self, sender_short: &str, actions: Vec<WorkerAction>) {
        let sender_id = NodeId::from_short(sender_short);
        for action in actions {
            match action {
                WorkerAction::SendUnicast(dest, frame) => self.send_one(&sender_id, &dest, frame),
                WorkerAction::SendMulticast(frame) => {
                    let targets: Vec<NodeId> = self
                        .order
                        .iter()
                        .filter(|s| s.as_str() != sender_short)
                        .map(|s| NodeId::from_short(s))
                        .collect();
                    for dest in targets {
                        self.send_one(&sender_id, &dest, frame.clone());
                    }
                }
            }
        }
    }

    fn send_one(&mut self, sender: &NodeId, dest: &NodeId, frame: leader_election_core::frame::codec::Frame) {
        self.sent += 1;
        if let Some(k) = self.drop_every {
            if k > 0 && self.sent % k == 0 {
                return;
            }
        }
        let bytes = frame.encode().unwrap();
        let session = self.sessions.get_mut(dest.short()).expect("unknown destination");
        let actions = session
            .process_raw_frame(sender.clone(), &bytes, MonotonicInstant::from_micros(0))
            .unwrap();
        // Recursive delivery one hop deep is enough here: replies generated
        // directly from frame processing (e.g. an immediate le_ack from a
        // le_m? query) are queued for the next `run_until_terminated` pass
        // rather than delivered inline, keeping this router iterative.
        self.pending.get_or_insert_with(Vec::new).push((dest.short().to_string(), actions));
    }

    fn run_until_terminated(&mut self, cfg: &WorkerConfig, rounds: usize) {
        let mut t = MonotonicInstant::from_micros(0);
        for _ in 0..rounds {
            t = t.add_micros(cfg.t_await_micros + 1);
            self.tick_all(cfg, t);
            t = t.add_micros(cfg.t_poll_micros + 1);
            self.tick_all(cfg, t);
            if self.all_terminated() {
                break;
            }
        }
    }

    fn tick_all(&mut self, _cfg: &WorkerConfig, now: MonotonicInstant) {
        let order = self.order.clone();
        let mut outbox = Vec::new();
        for short in &order {
            let actions = self.sessions.get_mut(short).unwrap().tick(now);
            outbox.push((short.clone(), actions));
        }
        for (sender, actions) in outbox {
            self.deliver(&sender, actions);
        }
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        let mut guard = 0;
        while let Some(batch) = self.pending.take() {
            guard += 1;
            assert!(guard < 64, "pending delivery did not converge");
            for (sender, actions) in batch {
                self.deliver(&sender, actions);
            }
        }
    }

    fn all_terminated(&self) -> bool {
        self.sessions.values().all(|s| matches!(s.state.phase, Phase::Terminated | Phase::Reporting | Phase::Done))
    }

    fn leader_of(&self, short: &str) -> NodeId {
        self.sessions[short].state.leader.clone()
    }
}

#[test]
fn scenario_a_three_node_ring_distinct_values() {
    let cfg = WorkerConfig::new(5, 1_000);
    let mut fleet = Fleet::ring(&["A", "B", "C"], &[42, 17, 200], cfg);
    fleet.start_all(MonotonicInstant::from_micros(0));
    fleet.run_until_terminated(&cfg, cfg.k as usize + 6);

    assert!(fleet.all_terminated());
    for short in ["A", "B", "C"] {
        assert_eq!(fleet.leader_of(short), NodeId::from_short("B"));
    }
}

#[test]
fn scenario_b_four_node_line_with_tie() {
    let cfg = WorkerConfig::new(5, 1_000);
    let mut fleet = Fleet::with_topology(&["A", "B", "C", "D"], &[50, 50, 90, 10], cfg, Topology::Line);
    fleet.start_all(MonotonicInstant::from_micros(0));
    fleet.run_until_terminated(&cfg, cfg.k as usize + 8);

    assert!(fleet.all_terminated());
    for short in ["A", "B", "C", "D"] {
        assert_eq!(fleet.leader_of(short), NodeId::from_short("D"));
    }
}

#[test]
fn scenario_c_five_node_ring_identical_values_breaks_tie_on_id() {
    let cfg = WorkerConfig::new(5, 1_000);
    let mut fleet = Fleet::ring(&["A", "B", "C", "D", "E"], &[30, 30, 30, 30, 30], cfg);
    fleet.start_all(MonotonicInstant::from_micros(0));
    fleet.run_until_terminated(&cfg, cfg.k as usize + 8);

    assert!(fleet.all_terminated());
    for short in ["A", "B", "C", "D", "E"] {
        assert_eq!(fleet.leader_of(short), NodeId::from_short("A"));
    }
}

#[test]
fn scenario_d_seven_node_tree_root_elected() {
    let cfg = WorkerConfig::new(5, 1_000);
    let shorts = ["R", "n1", "n2", "n3", "n4", "n5", "n6"];
    let ms = [5, 150, 160, 170, 180, 190, 200];
    let mut fleet = Fleet::with_topology(&shorts, &ms, cfg, Topology::Tree);
    fleet.start_all(MonotonicInstant::from_micros(0));
    fleet.run_until_terminated(&cfg, cfg.k as usize + 8);

    assert!(fleet.all_terminated());
    for short in shorts {
        assert_eq!(fleet.leader_of(short), NodeId::from_short("R"));
    }
}

#[test]
fn scenario_e_packet_loss_still_converges() {
    let cfg = WorkerConfig::new(5, 1_000);
    let mut fleet = Fleet::ring(&["A", "B", "C"], &[42, 17, 200], cfg).with_loss(3);
    fleet.start_all(MonotonicInstant::from_micros(0));
    fleet.run_until_terminated(&cfg, 4 * (cfg.k as usize + 5));

    assert!(fleet.all_terminated());
    for short in ["A", "B", "C"] {
        assert_eq!(fleet.leader_of(short), NodeId::from_short("B"));
    }
}
