// crates/leader-election-core/src/coordinator/state.rs
//! Coordinator-side experiment state (spec.md Sec. 3 `CoordinatorState`).
//! Grounded on the teacher's `ManagingNode` bookkeeping
//! (`node/mn/main.rs`'s `node_states: BTreeMap<NodeId, CnState>`),
//! generalized from a fixed, pre-configured node-assignment table to a
//! dynamically discovered fleet.

use crate::common::{ClockSync, MonotonicInstant};
use crate::types::{ElectionValue, NodeId, Topology};
use alloc::vec::Vec;

/// One discovered worker's record for the current experiment iteration.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub m: ElectionValue,
    pub confirmed_results: bool,
    pub reported_leader: Option<NodeId>,
    pub start_wall_sec: u32,
    pub elapsed_seconds: f64,
    pub msgs: u32,
    pub degree: u32,
}

impl NodeRecord {
    pub fn new(id: NodeId, m: ElectionValue) -> Self {
        Self {
            id,
            m,
            confirmed_results: false,
            reported_leader: None,
            start_wall_sec: 0,
            elapsed_seconds: 0.0,
            msgs: 0,
            degree: 0,
        }
    }
}

/// The coordinator's experiment phase (spec.md Sec. 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Discovering,
    Identifying,
    DistributingTopology,
    Starting,
    Collecting,
    Resetting,
}

/// Tunable experiment parameters.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub topology: Topology,
    pub discovery_rounds: u32,
    pub max_exp: u32,
    pub ping_interval_micros: u64,
    pub collect_min_timeout_micros: u64,
}

impl CoordinatorConfig {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            discovery_rounds: 3,
            max_exp: 10,
            ping_interval_micros: 2_000_000,
            collect_min_timeout_micros: 20_000_000,
        }
    }

    /// `max(20, ceil((N+1)/2))` seconds, expressed in microseconds
    /// (spec.md Sec. 4.4 "Collecting").
    pub fn collect_timeout_micros(&self, node_count: usize) -> u64 {
        let half = ((node_count as u64 + 1) + 1) / 2 * 1_000_000;
        self.collect_min_timeout_micros.max(half)
    }
}

pub struct CoordinatorState {
    pub nodes: Vec<NodeRecord>,
    pub min_idx: Option<usize>,
    pub discovery_rounds_remaining: u32,
    pub phase: CoordinatorPhase,
    pub clock_sync: Option<ClockSync>,
    pub correct_runs: u32,
    pub failed_runs: u32,
    pub iteration: u32,
    pub t_phase_start: Option<MonotonicInstant>,
    pub t_experiment_start: Option<MonotonicInstant>,
    pub pings_sent: u32,
    /// Mean start wall-clock time, one entry per *correct* iteration, kept
    /// across the whole session for the final cross-iteration summary
    /// (spec.md Sec. 6: "final cross-iteration block lists comma-separated
    /// startTimes and elapsed for correct runs only").
    pub correct_start_times: Vec<f64>,
    /// Mean elapsed seconds, one entry per *correct* iteration; paired
    /// index-for-index with `correct_start_times`.
    pub correct_elapsed: Vec<f64>,
}

impl CoordinatorState {
    pub fn new(cfg: &CoordinatorConfig) -> Self {
        Self {
            nodes: Vec::new(),
            min_idx: None,
            discovery_rounds_remaining: cfg.discovery_rounds,
            phase: CoordinatorPhase::Discovering,
            clock_sync: None,
            correct_runs: 0,
            failed_runs: 0,
            iteration: 0,
            t_phase_start: None,
            t_experiment_start: None,
            pings_sent: 0,
            correct_start_times: Vec::new(),
            correct_elapsed: Vec::new(),
        }
    }

    pub fn find_node_mut(&mut self, id: &NodeId) -> Option<&mut NodeRecord> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    /// Recomputes `min_idx` from scratch: the node with globally minimum `m`,
    /// lexicographically-smaller id breaking ties (spec.md Sec. 3, 4.2).
    pub fn recompute_min_idx(&mut self) {
        let mut best: Option<usize> = None;
        for (i, n) in self.nodes.iter().enumerate() {
            match best {
                None => best = Some(i),
                Some(b) => {
                    let bn = &self.nodes[b];
                    if n.m < bn.m || (n.m == bn.m && n.id < bn.id) {
                        best = Some(i);
                    }
                }
            }
        }
        self.min_idx = best;
    }

    pub fn min_node(&self) -> Option<&NodeRecord> {
        self.min_idx.map(|i| &self.nodes[i])
    }

    /// Resets all per-iteration node state, preserving only clock sync and
    /// aggregate run counters (spec.md Sec. 4.4 "Resetting").
    pub fn reset_for_next_iteration(&mut self, cfg: &CoordinatorConfig) {
        self.nodes.clear();
        self.min_idx = None;
        self.discovery_rounds_remaining = cfg.discovery_rounds;
        self.phase = CoordinatorPhase::Discovering;
        self.t_phase_start = None;
        self.t_experiment_start = None;
        self.pings_sent = 0;
        self.iteration += 1;
    }
}
