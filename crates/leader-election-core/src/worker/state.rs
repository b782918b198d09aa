// crates/leader-election-core/src/worker/state.rs
use crate::common::{ClockSync, MonotonicInstant};
use crate::frame::codec::Frame;
use crate::types::{ElectionValue, NodeId};
use alloc::vec::Vec;

/// An action a worker needs the surrounding runtime to perform: send a
/// frame somewhere. Plural sends (e.g. one `le_ack;` per neighbor) are
/// expressed as several actions rather than one action carrying a list,
/// keeping each action trivially replayable by the transport loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerAction {
    SendUnicast(NodeId, Frame),
    SendMulticast(Frame),
}

/// One entry in a worker's neighbor table (spec.md Sec. 3).
///
/// Invariant: `last_m.is_known() == last_leader.is_some()`. This is upheld
/// structurally by only ever setting both fields together
/// (`set_heard`/`clear_round`), so the invariant never needs a runtime
/// assertion.
#[derive(Debug, Clone)]
pub struct NeighborEntry {
    pub id: NodeId,
    last_m: ElectionValue,
    last_leader: Option<NodeId>,
}

impl NeighborEntry {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            last_m: ElectionValue::UNKNOWN,
            last_leader: None,
        }
    }

    pub fn last_m(&self) -> ElectionValue {
        self.last_m
    }

    pub fn last_leader(&self) -> Option<&NodeId> {
        self.last_leader.as_ref()
    }

    pub fn set_heard(&mut self, m: ElectionValue, leader: NodeId) {
        self.last_m = m;
        self.last_leader = Some(leader);
    }

    pub fn clear_round(&mut self) {
        self.last_m = ElectionValue::UNKNOWN;
        self.last_leader = None;
    }
}

/// The worker's lifecycle phase (spec.md Sec. 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Undiscovered,
    Identified,
    TopologyKnown,
    Running,
    Terminated,
    Reporting,
    Done,
}

/// Sub-phase of one MinMax-K round while `phase == Running` (spec.md
/// Sec. 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    EmitInitial,
    AwaitResponses,
    Poll,
    Decide,
}

/// Tunable timing/stability parameters. These must be configuration inputs
/// rather than magic constants (spec.md Sec. 9 REDESIGN FLAGS): `K` and `T`
/// vary across the original implementation's build variants.
///
/// `t_await`/`t_poll` default to the same value (`t`), giving spec.md's
/// single-timer-used-twice semantics; they can be set independently to
/// recover the two-timer (`T1`/`T2`) behavior observed in the fullest
/// original worker variant (see DESIGN.md Open Question 3).
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub k: i32,
    pub t_await_micros: u64,
    pub t_poll_micros: u64,
    pub max_result_attempts: u32,
    pub result_retry_interval_micros: u64,
}

impl WorkerConfig {
    pub fn new(k: i32, t_micros: u64) -> Self {
        Self {
            k,
            t_await_micros: t_micros,
            t_poll_micros: t_micros,
            max_result_attempts: 20,
            result_retry_interval_micros: 1_000_000,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(5, 3_000_000)
    }
}

/// The complete state of one worker's protocol actor (spec.md Sec. 3).
pub struct WorkerState {
    pub my_id: NodeId,
    pub my_m: ElectionValue,
    pub leader: NodeId,
    pub local_min: ElectionValue,
    pub k: i32,
    pub phase: Phase,
    pub round_phase: RoundPhase,
    pub neighbors: Vec<NeighborEntry>,
    /// True when running the unconstrained general topology: neighbor
    /// discovery is worker-driven (`disc;`) and round traffic is multicast
    /// instead of per-neighbor unicast (spec.md Sec. 4.3, 4.5).
    pub general_topology: bool,
    pub t_round_start: Option<MonotonicInstant>,
    pub t_election_start: Option<MonotonicInstant>,
    pub t_election_end: Option<MonotonicInstant>,
    pub msgs_in: u32,
    pub msgs_out: u32,
    pub coordinator_id: Option<NodeId>,
    pub result_confirmed: bool,
    pub result_attempts: u32,
    pub last_result_send: Option<MonotonicInstant>,
    /// Set once at startup from the coordinator's `sync;` command (spec.md
    /// Sec. 9 supplemented feature); lets `Frame::Results` report a real
    /// wall-clock start time instead of a raw monotonic reading.
    pub clock_sync: Option<ClockSync>,
}

impl WorkerState {
    pub fn new(my_id: NodeId) -> Self {
        Self {
            leader: my_id.clone(),
            my_id,
            my_m: ElectionValue::UNKNOWN,
            local_min: ElectionValue::UNKNOWN,
            k: 0,
            phase: Phase::Undiscovered,
            round_phase: RoundPhase::EmitInitial,
            neighbors: Vec::new(),
            general_topology: false,
            t_round_start: None,
            t_election_start: None,
            t_election_end: None,
            msgs_in: 0,
            msgs_out: 0,
            coordinator_id: None,
            result_confirmed: false,
            result_attempts: 0,
            last_result_send: None,
            clock_sync: None,
        }
    }

    /// Resets everything back to `Undiscovered` for the next experiment
    /// iteration, preserving only identity facts learned about the outside
    /// world (own id, coordinator id) that survive a reset in practice
    /// (spec.md Sec. 3 Lifecycles: "the coordinator-driven reset transitions
    /// everything back to `Undiscovered` atomically").
    pub fn reset(&mut self) {
        let my_id = self.my_id.clone();
        let coordinator_id = self.coordinator_id.clone();
        let clock_sync = self.clock_sync;
        *self = WorkerState::new(my_id);
        self.coordinator_id = coordinator_id;
        self.clock_sync = clock_sync;
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub fn find_neighbor_mut(&mut self, id: &NodeId) -> Option<&mut NeighborEntry> {
        self.neighbors.iter_mut().find(|n| &n.id == id)
    }

    pub fn has_neighbor(&self, id: &NodeId) -> bool {
        self.neighbors.iter().any(|n| &n.id == id)
    }

    pub fn msgs_total(&self) -> u32 {
        self.msgs_in + self.msgs_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_entry_invariant_holds_through_set_and_clear() {
        let mut n = NeighborEntry::new(NodeId::from_short("a"));
        assert!(!n.last_m().is_known());
        assert!(n.last_leader().is_none());

        n.set_heard(ElectionValue::new(10).unwrap(), NodeId::from_short("a"));
        assert!(n.last_m().is_known());
        assert!(n.last_leader().is_some());

        n.clear_round();
        assert!(!n.last_m().is_known());
        assert!(n.last_leader().is_none());
    }

    #[test]
    fn reset_preserves_identity_but_clears_election_state() {
        let mut s = WorkerState::new(NodeId::from_short("w1"));
        s.coordinator_id = Some(NodeId::from_short("c"));
        s.phase = Phase::Terminated;
        s.neighbors.push(NeighborEntry::new(NodeId::from_short("w2")));
        s.msgs_in = 10;

        s.reset();

        assert_eq!(s.phase, Phase::Undiscovered);
        assert!(s.neighbors.is_empty());
        assert_eq!(s.msgs_in, 0);
        assert_eq!(s.my_id, NodeId::from_short("w1"));
        assert_eq!(s.coordinator_id, Some(NodeId::from_short("c")));
    }
}
