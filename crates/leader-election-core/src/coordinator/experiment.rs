// crates/leader-election-core/src/coordinator/experiment.rs
//! The full coordinator experiment loop: Discovering -> DistributingTopology
//! -> Starting -> Collecting -> Resetting, repeated `MAX_EXP` times.
//! Grounded on the teacher's `ManagingNode::tick` phase dispatch
//! (`node/mn/main.rs`), generalized from a fixed NMT cycle to the
//! discover/start/collect/reset experiment cycle of spec.md Sec. 4.4.

use super::discovery::{self, CoordinatorAction};
use super::state::{CoordinatorConfig, CoordinatorPhase, CoordinatorState};
use super::topology_builder;
use crate::common::{ClockSync, MonotonicInstant};
use crate::frame::codec::{Codec, Frame};
use crate::types::NodeId;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use log::{info, warn};
use rand::Rng;

/// How long to wait after distributing topology before sending `start;`
/// (spec.md Sec. 4.4: "(1 s quiescence)").
const QUIESCENCE_MICROS: u64 = 1_000_000;
/// Spacing between the two `start;` multicasts (redundancy against loss).
const START_REDUNDANCY_SPACING_MICROS: u64 = 100;
/// Bounded drain during reset (spec.md Sec. 4.4 "Resetting").
const RESET_DRAIN_LIMIT: u32 = 20;
const RESET_SLEEP_MICROS: u64 = 5_000_000;

/// Drives one coordinator through an entire multi-iteration experiment.
pub struct ExperimentDriver {
    pub state: CoordinatorState,
    pub config: CoordinatorConfig,
    start_sent_once: bool,
    /// One-shot latch for `tick_distributing`: set the instant
    /// `distribute_topology` has run for the current iteration, so the
    /// guard doesn't key off `t_phase_start` (which `distribute_topology`
    /// itself needs to set for the `Starting` quiescence wait that follows).
    distributed: bool,
    drained: u32,
}

impl ExperimentDriver {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            state: CoordinatorState::new(&config),
            config,
            start_sent_once: false,
            distributed: false,
            drained: 0,
        }
    }

    /// Handles the one-shot `sync <unix_ts>` shell command (spec.md Sec. 6).
    /// Rejected if a sync has already been applied.
    pub fn handle_sync(&mut self, unix_ts: u32, now: MonotonicInstant) -> Result<(), &'static str> {
        if self.state.clock_sync.is_some() {
            return Err("already synced");
        }
        self.state.clock_sync = Some(ClockSync::new(unix_ts, now));
        Ok(())
    }

    /// Handles the `rounds <n>` shell command. Rejected once synced, mirroring
    /// the source's one-shot configuration window (spec.md Sec. 6).
    pub fn handle_rounds(&mut self, n: u32) -> Result<(), &'static str> {
        if self.state.clock_sync.is_some() {
            return Err("cannot change rounds after sync");
        }
        self.config.discovery_rounds = n;
        self.state.discovery_rounds_remaining = n;
        Ok(())
    }

    pub fn process_raw_frame(
        &mut self,
        sender: NodeId,
        bytes: &[u8],
        now: MonotonicInstant,
        rng: &mut impl Rng,
    ) -> Result<Vec<CoordinatorAction>, crate::hal::LeaderElectionError> {
        let frame = crate::frame::decode_frame(bytes)?;
        Ok(self.on_frame(sender, frame, now, rng))
    }

    fn on_frame(
        &mut self,
        sender: NodeId,
        frame: Frame,
        now: MonotonicInstant,
        rng: &mut impl Rng,
    ) -> Vec<CoordinatorAction> {
        match frame {
            Frame::Pong if self.state.phase == CoordinatorPhase::Discovering => {
                discovery::on_pong(&mut self.state, sender, rng)
            }
            Frame::Results { leader, start_wall_sec, elapsed_seconds, msgs, degree } => {
                self.on_results(sender, leader, start_wall_sec, elapsed_seconds, msgs, degree)
            }
            Frame::Failure => {
                warn!("[coordinator] failure; received from {}, aborting iteration", sender);
                self.begin_reset()
            }
            _ => {
                warn!("[coordinator] unexpected frame {:?} from {}, ignoring", frame, sender);
                Vec::new()
            }
        }
    }

    /// `results;` handling (spec.md Sec. 4.4 "Collecting"): deduplicated by
    /// sender, first occurrence recorded, always `rconf;`-acknowledged even
    /// on a duplicate (the duplicate is expected from unconfirmed retries).
    fn on_results(
        &mut self,
        sender: NodeId,
        leader: NodeId,
        start_wall_sec: u32,
        elapsed_seconds: f64,
        msgs: u32,
        degree: u32,
    ) -> Vec<CoordinatorAction> {
        if self.state.phase != CoordinatorPhase::Collecting {
            return Vec::new();
        }
        let Some(record) = self.state.find_node_mut(&sender) else {
            warn!("[coordinator] results; from unknown node {}, ignoring", sender);
            return Vec::new();
        };
        if !record.confirmed_results {
            record.reported_leader = Some(leader);
            record.start_wall_sec = start_wall_sec;
            record.elapsed_seconds = elapsed_seconds;
            record.msgs = msgs;
            record.degree = degree;
            record.confirmed_results = true;
        }
        alloc::vec![CoordinatorAction::SendUnicast(sender, Frame::Rconf)]
    }

    /// Advances time-driven phases. Call on every scheduler wakeup.
    pub fn tick(&mut self, now: MonotonicInstant) -> Vec<CoordinatorAction> {
        match self.state.phase {
            CoordinatorPhase::Discovering => discovery::tick_discovery(&mut self.state, &self.config, now),
            CoordinatorPhase::DistributingTopology => self.tick_distributing(now),
            CoordinatorPhase::Starting => self.tick_starting(now),
            CoordinatorPhase::Collecting => self.tick_collecting(now),
            CoordinatorPhase::Resetting => self.tick_resetting(now),
            CoordinatorPhase::Identifying => Vec::new(),
        }
    }

    fn tick_distributing(&mut self, now: MonotonicInstant) -> Vec<CoordinatorAction> {
        if self.distributed {
            return Vec::new();
        }
        self.distributed = true;
        let actions = topology_builder::distribute_topology(&mut self.state, &self.config);
        // `distribute_topology` already moved `state.phase` to `Starting`;
        // (re-)mark the phase-start here so the quiescence wait in
        // `tick_starting` measures from the moment distribution finished.
        self.state.t_phase_start = Some(now);
        actions
    }

    fn tick_starting(&mut self, now: MonotonicInstant) -> Vec<CoordinatorAction> {
        let started = self.state.t_phase_start.unwrap_or(now);
        if now.duration_since_micros(started) < QUIESCENCE_MICROS {
            return Vec::new();
        }

        if !self.start_sent_once {
            self.start_sent_once = true;
            self.state.t_experiment_start = Some(now);
            info!("[coordinator] sending start; (first of two)");
            return alloc::vec![CoordinatorAction::SendMulticast(Frame::Start)];
        }

        if now.duration_since_micros(started) >= QUIESCENCE_MICROS + START_REDUNDANCY_SPACING_MICROS {
            self.state.phase = CoordinatorPhase::Collecting;
            self.state.t_phase_start = Some(now);
            self.start_sent_once = false;
            return alloc::vec![CoordinatorAction::SendMulticast(Frame::Start)];
        }

        Vec::new()
    }

    fn tick_collecting(&mut self, now: MonotonicInstant) -> Vec<CoordinatorAction> {
        let started = self.state.t_phase_start.unwrap_or(now);
        let timeout = self.config.collect_timeout_micros(self.state.nodes.len());
        let all_reported = !self.state.nodes.is_empty() && self.state.nodes.iter().all(|n| n.confirmed_results);
        if all_reported || now.duration_since_micros(started) >= timeout {
            if !all_reported {
                warn!(
                    "[coordinator] collection timed out with {}/{} reporting",
                    self.state.nodes.iter().filter(|n| n.confirmed_results).count(),
                    self.state.nodes.len()
                );
            }
            return self.finish_iteration();
        }
        Vec::new()
    }

    /// Builds the CSV-style report, scores correctness, updates run
    /// counters, and transitions into `Resetting` (spec.md Sec. 4.4, 6).
    fn finish_iteration(&mut self) -> Vec<CoordinatorAction> {
        let mut actions = Vec::new();

        let expected_leader = self.state.min_node().map(|n| n.id.clone());
        let all_reported = self.state.nodes.iter().all(|n| n.confirmed_results);
        let correct = all_reported
            && expected_leader
                .as_ref()
                .map(|expected| self.state.nodes.iter().all(|n| n.reported_leader.as_ref() == Some(expected)))
                .unwrap_or(false);

        actions.push(CoordinatorAction::Log(String::from(
            "node,m,elected,correct,startTime,runTime,messages,degree",
        )));
        let mut total_time = 0.0f64;
        let mut total_msgs = 0u64;
        let mut reporting = 0u64;
        for n in &self.state.nodes {
            let elected = n.reported_leader.as_ref().map(|l| l.to_string()).unwrap_or_else(|| String::from("?"));
            let node_correct = expected_leader.as_ref() == n.reported_leader.as_ref();
            actions.push(CoordinatorAction::Log(format!(
                "{},{},{},{},{},{},{},{}",
                n.id, n.m, elected, node_correct, n.start_wall_sec, n.elapsed_seconds, n.msgs, n.degree
            )));
            if n.confirmed_results {
                total_time += n.elapsed_seconds;
                total_msgs += n.msgs as u64;
                reporting += 1;
            }
        }
        actions.push(CoordinatorAction::Log(format!("Correct: {}", if correct { "yes" } else { "no" })));
        if reporting > 0 {
            actions.push(CoordinatorAction::Log(format!("AvgTime: {}/{} sec", total_time, reporting)));
            actions.push(CoordinatorAction::Log(format!("AvgMsgs: {}/{} msgs", total_msgs, reporting)));
        }

        if correct {
            self.state.correct_runs += 1;
            if reporting > 0 {
                self.state.correct_start_times.push(
                    self.state.nodes.iter().map(|n| n.start_wall_sec as f64).sum::<f64>() / reporting as f64,
                );
                self.state.correct_elapsed.push(total_time / reporting as f64);
            }
        } else {
            self.state.failed_runs += 1;
        }

        self.state.phase = CoordinatorPhase::Resetting;
        self.state.t_phase_start = None;
        self.drained = 0;
        actions
    }

    fn tick_resetting(&mut self, now: MonotonicInstant) -> Vec<CoordinatorAction> {
        if self.drained < RESET_DRAIN_LIMIT {
            self.drained += 1;
            return Vec::new();
        }

        let started = self.state.t_phase_start.get_or_insert(now);
        if now.duration_since_micros(*started) < RESET_SLEEP_MICROS {
            return Vec::new();
        }

        self.state.reset_for_next_iteration(&self.config);
        self.start_sent_once = false;
        self.distributed = false;
        if self.is_experiment_finished() {
            info!(
                "[coordinator] experiment complete: {} correct, {} failed",
                self.state.correct_runs, self.state.failed_runs
            );
            return self.final_summary();
        }
        Vec::new()
    }

    /// The final cross-iteration block (spec.md Sec. 6): comma-separated
    /// `startTimes` and `elapsed` values, one pair per correct iteration only.
    fn final_summary(&self) -> Vec<CoordinatorAction> {
        let start_times: Vec<String> = self.state.correct_start_times.iter().map(|t| format!("{}", t)).collect();
        let elapsed: Vec<String> = self.state.correct_elapsed.iter().map(|t| format!("{}", t)).collect();
        alloc::vec![
            CoordinatorAction::Log(format!("startTimes: {}", start_times.join(","))),
            CoordinatorAction::Log(format!("elapsed: {}", elapsed.join(","))),
        ]
    }

    pub fn is_experiment_finished(&self) -> bool {
        self.state.iteration >= self.config.max_exp
    }

    pub fn begin_reset(&mut self) -> Vec<CoordinatorAction> {
        self.state.failed_runs += 1;
        self.state.phase = CoordinatorPhase::Resetting;
        self.state.t_phase_start = None;
        self.drained = 0;
        Vec::new()
    }
}
