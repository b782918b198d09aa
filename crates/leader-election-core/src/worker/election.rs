// crates/leader-election-core/src/worker/election.rs
//! The MinMax-K round state machine — the algorithmic heart of the whole
//! system (spec.md Sec. 4.5). Grounded on the match-based transition style
//! of the teacher crate's `DllCsStateMachine`
//! (`frame/cs_state_machine.rs`), generalized from a fixed DLL cycle state
//! table to the four MinMax-K round phases.

use super::state::{Phase, RoundPhase, WorkerConfig, WorkerState, WorkerAction};
use crate::common::MonotonicInstant;
use crate::frame::codec::Frame;
use crate::types::{ElectionValue, NodeId};
use alloc::vec::Vec;
use log::{debug, warn};

/// Transitions `Undiscovered -> Running.EmitInitial` on receipt of `start;`
/// (spec.md Sec. 4.5 diagram).
pub fn start_election(
    state: &mut WorkerState,
    cfg: &WorkerConfig,
    now: MonotonicInstant,
) -> Vec<WorkerAction> {
    state.phase = Phase::Running;
    state.k = cfg.k;
    state.leader = state.my_id.clone();
    state.local_min = state.my_m;
    state.t_election_start = Some(now);
    emit_initial(state, now)
}

/// `EmitInitial`: broadcasts the current `(local_min, leader)` and starts
/// the round timer.
fn emit_initial(state: &mut WorkerState, now: MonotonicInstant) -> Vec<WorkerAction> {
    state.t_round_start = Some(now);
    state.round_phase = RoundPhase::AwaitResponses;

    if state.neighbors.is_empty() && !state.general_topology {
        // Boundary behavior: a node with no neighbors (N=1, or isolated in
        // a line/tree) has nobody to converge with; short-circuit straight
        // to Terminated (spec.md Sec. 8 "Boundary behaviors").
        return terminate(state, now);
    }

    broadcast_le_ack(state)
}

fn broadcast_le_ack(state: &mut WorkerState) -> Vec<WorkerAction> {
    let frame = Frame::LeAck {
        m: state.local_min,
        owner: state.leader.clone(),
    };
    if state.general_topology {
        if matches!(state.phase, Phase::Running | Phase::Reporting) {
            state.msgs_out += 1;
        }
        alloc::vec![WorkerAction::SendMulticast(frame)]
    } else {
        let actions: Vec<WorkerAction> = state
            .neighbors
            .iter()
            .map(|n| WorkerAction::SendUnicast(n.id.clone(), frame.clone()))
            .collect();
        if matches!(state.phase, Phase::Running | Phase::Reporting) {
            state.msgs_out += actions.len() as u32;
        }
        actions
    }
}

fn terminate(state: &mut WorkerState, now: MonotonicInstant) -> Vec<WorkerAction> {
    state.phase = Phase::Terminated;
    state.t_election_end = Some(now);
    Vec::new()
}

/// Drives one `tick`: checks whether the current round phase's deadline has
/// elapsed and, if so, advances the state machine.
pub fn on_tick(
    state: &mut WorkerState,
    cfg: &WorkerConfig,
    now: MonotonicInstant,
) -> Vec<WorkerAction> {
    if state.phase != Phase::Running {
        return Vec::new();
    }
    match state.round_phase {
        RoundPhase::EmitInitial => emit_initial(state, now),
        RoundPhase::AwaitResponses => {
            let started = state.t_round_start.unwrap_or(now);
            if now.duration_since_micros(started) >= cfg.t_await_micros {
                poll(state, now)
            } else {
                Vec::new()
            }
        }
        RoundPhase::Poll => {
            let started = state.t_round_start.unwrap_or(now);
            if now.duration_since_micros(started) >= cfg.t_poll_micros {
                decide(state, cfg, now)
            } else {
                Vec::new()
            }
        }
        RoundPhase::Decide => Vec::new(),
    }
}

/// `Poll`: queries every neighbor whose `last_m` is still unknown. Skipped
/// entirely in general topology, since a worker may not know all its
/// neighbors' ids yet (spec.md Sec. 4.5).
fn poll(state: &mut WorkerState, now: MonotonicInstant) -> Vec<WorkerAction> {
    let mut actions = Vec::new();
    if !state.general_topology {
        for n in &state.neighbors {
            if !n.last_m().is_known() {
                actions.push(WorkerAction::SendUnicast(n.id.clone(), Frame::LeM));
            }
        }
        if matches!(state.phase, Phase::Running | Phase::Reporting) {
            state.msgs_out += actions.len() as u32;
        }
    }
    state.t_round_start = Some(now);
    state.round_phase = RoundPhase::Poll;
    actions
}

/// `Decide`: folds neighbor values into a new `(round_min, round_leader)`,
/// decrements `k`, adopts or terminates, then either re-emits (no change)
/// or waits for responses (an update was already broadcast).
fn decide(state: &mut WorkerState, cfg: &WorkerConfig, now: MonotonicInstant) -> Vec<WorkerAction> {
    state.round_phase = RoundPhase::Decide;

    for n in &state.neighbors {
        if !n.last_m().is_known() {
            warn!(
                "[election] neighbor {} silent after polling; continuing (lenient default)",
                n.id
            );
        }
    }

    let (round_min, round_leader) = fold_round_minimum(state);

    state.k -= 1;

    let leader_changed = round_leader != state.leader;
    if leader_changed {
        debug!(
            "[election] {} adopting leader {} (m={}), k reset to {}",
            state.my_id, round_leader, round_min, cfg.k
        );
        let previous_holders: Vec<Option<NodeId>> =
            state.neighbors.iter().map(|n| n.last_leader().cloned()).collect();
        state.leader = round_leader;
        state.local_min = round_min;
        state.k = cfg.k;

        for n in &mut state.neighbors {
            n.clear_round();
        }

        let new_leader = state.leader.clone();
        let frame = Frame::LeAck {
            m: state.local_min,
            owner: new_leader.clone(),
        };
        let actions = if state.general_topology {
            if matches!(state.phase, Phase::Running | Phase::Reporting) {
                state.msgs_out += 1;
            }
            alloc::vec![WorkerAction::SendMulticast(frame)]
        } else {
            let mut out = Vec::new();
            for (n, held) in state.neighbors.iter().zip(previous_holders.iter()) {
                if held.as_ref() != Some(&new_leader) {
                    out.push(WorkerAction::SendUnicast(n.id.clone(), frame.clone()));
                }
            }
            if matches!(state.phase, Phase::Running | Phase::Reporting) {
                state.msgs_out += out.len() as u32;
            }
            out
        };
        state.t_round_start = Some(now);
        state.round_phase = RoundPhase::AwaitResponses;
        return actions;
    }

    if state.k < 0 {
        return terminate(state, now);
    }

    for n in &mut state.neighbors {
        n.clear_round();
    }

    // No adoption this round but the counter has not yet expired: re-emit
    // the unchanged value to keep the round progressing.
    emit_initial(state, now)
}

/// Computes the componentwise minimum of `(local_min, leader)` and every
/// neighbor's last-heard `(m, leader)`, ties broken by lexicographically
/// smaller leader id (spec.md Sec. 4.5 step 1, canonicalized per Sec. 9).
fn fold_round_minimum(state: &WorkerState) -> (ElectionValue, NodeId) {
    let mut round_min = state.local_min;
    let mut round_leader = state.leader.clone();
    for n in &state.neighbors {
        if !n.last_m().is_known() {
            continue;
        }
        let Some(candidate_leader) = n.last_leader() else {
            continue;
        };
        let m = n.last_m();
        if m < round_min || (m == round_min && candidate_leader < &round_leader) {
            round_min = m;
            round_leader = candidate_leader.clone();
        }
    }
    (round_min, round_leader)
}

/// Handles an incoming `le_ack;<m>;<owner>;` from `sender`. Drops silently
/// if `sender` is not a known neighbor (spec.md Sec. 4.5: "likely a stale
/// packet from a previous experiment").
pub fn on_le_ack(state: &mut WorkerState, sender: &NodeId, m: ElectionValue, leader: NodeId) {
    let counts = matches!(state.phase, Phase::Running | Phase::Reporting);
    match state.find_neighbor_mut(sender) {
        Some(n) => {
            n.set_heard(m, leader);
            if counts {
                state.msgs_in += 1;
            }
        }
        None => {
            debug!(
                "[election] le_ack from unknown neighbor {}; dropping (stale packet)",
                sender
            );
        }
    }
}

/// Handles an incoming `le_m?;` from `sender`: always reply immediately
/// with the worker's current best value, regardless of phase — idempotent
/// and safe even after termination (spec.md Sec. 4.5).
pub fn on_le_m_query(state: &mut WorkerState, sender: &NodeId) -> WorkerAction {
    if matches!(state.phase, Phase::Running | Phase::Reporting) {
        state.msgs_out += 1;
    }
    WorkerAction::SendUnicast(
        sender.clone(),
        Frame::LeAck {
            m: state.local_min,
            owner: state.leader.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::state::NeighborEntry;

    fn setup_ring(my_short: &str, neighbor_shorts: &[&str], m: u16) -> WorkerState {
        let mut s = WorkerState::new(NodeId::from_short(my_short));
        s.my_m = ElectionValue::new(m).unwrap();
        s.phase = Phase::TopologyKnown;
        for ns in neighbor_shorts {
            s.neighbors.push(NeighborEntry::new(NodeId::from_short(ns)));
        }
        s
    }

    #[test]
    fn single_node_short_circuits_to_terminated() {
        let mut s = setup_ring("a", &[], 10);
        let cfg = WorkerConfig::default();
        let actions = start_election(&mut s, &cfg, MonotonicInstant::from_micros(0));
        assert!(actions.is_empty());
        assert_eq!(s.phase, Phase::Terminated);
        assert_eq!(s.leader, NodeId::from_short("a"));
        assert_eq!(s.k, cfg.k); // msgs_in/out stay at 0, no round ran
        assert_eq!(s.msgs_in, 0);
        assert_eq!(s.msgs_out, 0);
    }

    #[test]
    fn emit_initial_sends_to_every_neighbor() {
        let mut s = setup_ring("b", &["a", "c"], 17);
        let cfg = WorkerConfig::default();
        let actions = start_election(&mut s, &cfg, MonotonicInstant::from_micros(0));
        assert_eq!(actions.len(), 2);
        assert_eq!(s.round_phase, RoundPhase::AwaitResponses);
        assert_eq!(s.msgs_out, 2);
    }

    #[test]
    fn le_ack_from_unknown_neighbor_is_dropped() {
        let mut s = setup_ring("b", &["a"], 17);
        on_le_ack(&mut s, &NodeId::from_short("zzz"), ElectionValue::new(5).unwrap(), NodeId::from_short("zzz"));
        assert_eq!(s.msgs_in, 0);
    }

    #[test]
    fn le_ack_from_known_neighbor_updates_entry_and_counts() {
        let mut s = setup_ring("b", &["a"], 17);
        s.phase = Phase::Running;
        on_le_ack(&mut s, &NodeId::from_short("a"), ElectionValue::new(5).unwrap(), NodeId::from_short("a"));
        assert_eq!(s.msgs_in, 1);
        let n = s.find_neighbor_mut(&NodeId::from_short("a")).unwrap();
        assert_eq!(n.last_m().get(), 5);
    }

    #[test]
    fn le_m_query_always_answered_even_when_done() {
        let mut s = setup_ring("b", &["a"], 17);
        s.phase = Phase::Done;
        let action = on_le_m_query(&mut s, &NodeId::from_short("a"));
        match action {
            WorkerAction::SendUnicast(dest, Frame::LeAck { .. }) => {
                assert_eq!(dest, NodeId::from_short("a"));
            }
            _ => panic!("expected unicast le_ack reply"),
        }
    }

    #[test]
    fn scenario_a_three_node_ring_converges_on_min_value() {
        // spec.md Sec. 8 Scenario A: A=42, B=17, C=200; expect leader=B.
        let cfg = WorkerConfig::new(5, 1_000);
        let mut a = setup_ring("A", &["C", "B"], 42);
        let mut b = setup_ring("B", &["A", "C"], 17);
        let mut c = setup_ring("C", &["B", "A"], 200);
        for s in [&mut a, &mut b, &mut c] {
            s.phase = Phase::TopologyKnown;
        }

        let mut t = MonotonicInstant::from_micros(0);
        start_election(&mut a, &cfg, t);
        start_election(&mut b, &cfg, t);
        start_election(&mut c, &cfg, t);

        // Run enough rounds for K+diameter convergence (generously bounded).
        for _ in 0..(cfg.k as usize + 5) {
            t = t.add_micros(cfg.t_await_micros + 1);
            let act_a = on_tick(&mut a, &cfg, t);
            let act_b = on_tick(&mut b, &cfg, t);
            let act_c = on_tick(&mut c, &cfg, t);
            deliver(&mut a, &mut b, &mut c, act_a, act_b, act_c);

            t = t.add_micros(cfg.t_poll_micros + 1);
            let act_a = on_tick(&mut a, &cfg, t);
            let act_b = on_tick(&mut b, &cfg, t);
            let act_c = on_tick(&mut c, &cfg, t);
            deliver(&mut a, &mut b, &mut c, act_a, act_b, act_c);

            if a.phase == Phase::Terminated && b.phase == Phase::Terminated && c.phase == Phase::Terminated {
                break;
            }
        }

        assert_eq!(a.phase, Phase::Terminated);
        assert_eq!(b.phase, Phase::Terminated);
        assert_eq!(c.phase, Phase::Terminated);
        assert_eq!(a.leader, NodeId::from_short("B"));
        assert_eq!(b.leader, NodeId::from_short("B"));
        assert_eq!(c.leader, NodeId::from_short("B"));
        assert_eq!(a.local_min.get(), 17);
    }

    fn deliver(
        a: &mut WorkerState,
        b: &mut WorkerState,
        c: &mut WorkerState,
        act_a: Vec<WorkerAction>,
        act_b: Vec<WorkerAction>,
        act_c: Vec<WorkerAction>,
    ) {
        let tagged = [(a.my_id.clone(), act_a), (b.my_id.clone(), act_b), (c.my_id.clone(), act_c)];
        for (sender, actions) in tagged {
            for action in actions {
                if let WorkerAction::SendUnicast(dest, Frame::LeAck { m, owner }) = action {
                    let target = if dest == a.my_id {
                        &mut *a
                    } else if dest == b.my_id {
                        &mut *b
                    } else if dest == c.my_id {
                        &mut *c
                    } else {
                        continue;
                    };
                    on_le_ack(target, &sender, m, owner);
                }
            }
        }
    }
}
