// crates/leader-election-core/src/worker/session.rs
//! The worker-side protocol actor. Grounded on the teacher's `node/cn/main.rs`
//! outer loop shape (receive-dispatch-tick) generalized from POWERLINK's fixed
//! DLL-cycle driving to the coordinator/election lifecycle of spec.md Sec. 3.

use super::election;
use super::reporter;
use super::state::{NeighborEntry, Phase, WorkerAction, WorkerConfig, WorkerState};
use crate::common::MonotonicInstant;
use crate::frame::codec::{Codec, Frame};
use crate::hal::LeaderElectionError;
use crate::types::NodeId;
use alloc::vec::Vec;
use log::{info, warn};

/// Ties a `WorkerState` to a `WorkerConfig` and drives it through every
/// phase: discovery reply, topology/general-discovery acquisition, election,
/// result reporting, and coordinator-driven reset.
pub struct WorkerSession {
    pub state: WorkerState,
    pub config: WorkerConfig,
}

impl WorkerSession {
    pub fn new(my_id: NodeId, config: WorkerConfig) -> Self {
        Self {
            state: WorkerState::new(my_id),
            config,
        }
    }

    /// Processes one inbound frame from `sender`, returning any actions the
    /// runtime should perform in response.
    pub fn process_raw_frame(
        &mut self,
        sender: NodeId,
        bytes: &[u8],
        now: MonotonicInstant,
    ) -> Result<Vec<WorkerAction>, LeaderElectionError> {
        let frame = crate::frame::decode_frame(bytes)?;
        Ok(self.on_frame(sender, frame, now))
    }

    fn on_frame(&mut self, sender: NodeId, frame: Frame, now: MonotonicInstant) -> Vec<WorkerAction> {
        match frame {
            Frame::Ping => self.on_ping(sender),
            Frame::Conf { m, short_id } => self.on_conf(sender, m, short_id),
            Frame::Ips { neighbors } => self.on_ips(neighbors),
            Frame::Discover => self.on_discover(sender),
            Frame::Disc => self.on_disc(sender),
            Frame::Start => election::start_election(&mut self.state, &self.config, now),
            Frame::LeAck { m, owner } => {
                election::on_le_ack(&mut self.state, &sender, m, owner);
                Vec::new()
            }
            Frame::LeM => alloc::vec![election::on_le_m_query(&mut self.state, &sender)],
            Frame::Rconf => {
                reporter::on_rconf(&mut self.state);
                Vec::new()
            }
            Frame::Failure => {
                warn!(
                    "[worker {}] received failure;, aborting iteration and re-entering Undiscovered",
                    self.state.my_id
                );
                self.state.reset();
                Vec::new()
            }
            // `Pong`/`LeAck` already handled; `Results` is coordinator-bound;
            // receiving one here is a protocol error from a misconfigured
            // peer. Log and ignore rather than abort the whole session.
            Frame::Pong | Frame::Results { .. } => {
                warn!(
                    "[worker {}] unexpected frame from {}, ignoring",
                    self.state.my_id, sender
                );
                Vec::new()
            }
        }
    }

    fn on_ping(&mut self, sender: NodeId) -> Vec<WorkerAction> {
        // A fresh `ping;` cancels any lingering state left over from a
        // *finished* iteration and re-enters `Undiscovered` (spec.md
        // Sec. 4.6: "on receiving a fresh ping; ... the worker resets to
        // Undiscovered for the next iteration"; Sec. 5: "A new ping; ...
        // cancels any lingering worker state"). Repeated `ping;`s that land
        // mid-discovery (the coordinator retransmits several rounds, spec.md
        // Sec. 4.2) must NOT reset an already-`Identified` worker, or every
        // retransmission would wipe the `m` it was just confirmed with.
        if matches!(self.state.phase, Phase::Terminated | Phase::Reporting | Phase::Done) {
            info!(
                "[worker {}] fresh ping; from {} resets lingering state (was {:?})",
                self.state.my_id, sender, self.state.phase
            );
            self.state.reset();
        }
        if self.state.phase == Phase::Undiscovered {
            self.state.coordinator_id = Some(sender.clone());
            self.state.phase = Phase::Identified;
            info!("[worker {}] discovered by coordinator {}", self.state.my_id, sender);
        }
        alloc::vec![WorkerAction::SendUnicast(sender, Frame::Pong)]
    }

    /// `conf;<m>;<short_id>;`: the coordinator assigns this worker's election
    /// value and confirms its own canonical short id.
    fn on_conf(&mut self, sender: NodeId, m: crate::types::ElectionValue, short_id: alloc::string::String) -> Vec<WorkerAction> {
        if Some(&sender) != self.state.coordinator_id.as_ref() {
            warn!(
                "[worker {}] conf; from non-coordinator {}, ignoring",
                self.state.my_id, sender
            );
            return Vec::new();
        }
        self.state.my_id = NodeId::from_short(&short_id);
        self.state.my_m = m;
        self.state.leader = self.state.my_id.clone();
        Vec::new()
    }

    /// `ips;<n1>;<n2>;...;`: the coordinator hands down this worker's
    /// neighbor list for a fixed topology. Duplicate entries are dropped
    /// defensively (spec.md Sec. 9 supplemented guard).
    fn on_ips(&mut self, neighbors: alloc::vec::Vec<NodeId>) -> Vec<WorkerAction> {
        self.state.neighbors.clear();
        for n in neighbors {
            if !self.state.has_neighbor(&n) {
                self.state.neighbors.push(NeighborEntry::new(n));
            } else {
                warn!(
                    "[worker {}] ips; listed duplicate neighbor, dropping",
                    self.state.my_id
                );
            }
        }
        self.state.general_topology = false;
        self.state.phase = Phase::TopologyKnown;
        Vec::new()
    }

    /// `discover;`: the coordinator's cue to begin general-topology peer
    /// discovery — broadcast `disc;` and start collecting replies.
    fn on_discover(&mut self, _sender: NodeId) -> Vec<WorkerAction> {
        self.state.general_topology = true;
        self.state.phase = Phase::TopologyKnown;
        alloc::vec![WorkerAction::SendMulticast(Frame::Disc)]
    }

    /// `disc;` from a peer during general-topology discovery: register it as
    /// a neighbor if not already known.
    fn on_disc(&mut self, sender: NodeId) -> Vec<WorkerAction> {
        if sender == self.state.my_id {
            return Vec::new();
        }
        if !self.state.has_neighbor(&sender) {
            self.state.neighbors.push(NeighborEntry::new(sender));
        }
        Vec::new()
    }

    /// Advances time-driven behavior: election round ticks and result-report
    /// retries. Call on every scheduler wakeup.
    pub fn tick(&mut self, now: MonotonicInstant) -> Vec<WorkerAction> {
        let mut actions = election::on_tick(&mut self.state, &self.config, now);

        if self.state.phase == Phase::Terminated {
            self.state.phase = Phase::Reporting;
            self.state.t_election_end = self.state.t_election_end.or(Some(now));
        }

        if self.state.phase == Phase::Reporting {
            actions.extend(reporter::on_tick(&mut self.state, &self.config, now));
        }

        actions
    }

    /// Resets the session for the next experiment iteration, keeping
    /// identity facts only (spec.md Sec. 3 Lifecycles).
    pub fn reset_for_next_run(&mut self) {
        self.state.reset();
    }
}
