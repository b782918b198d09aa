// crates/leader-election-core/src/coordinator/discovery.rs
//! The coordinator's discovery engine (spec.md Sec. 4.2): multicast `ping;`
//! repeated `discovery_rounds` times, `pong;` replies turned into fresh
//! random `m` assignments. Grounded on the teacher's `scheduler::find_next_node_to_identify`
//! / `handle_asnd_frame(IdentResponse)` pair (`node/mn/scheduler.rs`,
//! `node/mn/main.rs`), generalized from a fixed node-assignment table to
//! nodes discovered on the fly.

use super::state::{CoordinatorConfig, CoordinatorPhase, CoordinatorState, NodeRecord};
use crate::common::MonotonicInstant;
use crate::frame::codec::Frame;
use crate::types::{ElectionValue, MAX_NODES, NodeId};
use alloc::vec::Vec;
use log::{info, warn};
use rand::Rng;

/// Action the caller needs to perform: send a frame, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorAction {
    SendUnicast(NodeId, Frame),
    SendMulticast(Frame),
    /// A line of CSV-style reporting text for stdout (spec.md Sec. 4.4, 6).
    Log(alloc::string::String),
}

/// Called on a schedule (~2 s) while `phase == Discovering`. Emits a
/// multicast `ping;` and consumes one of the configured discovery rounds.
pub fn tick_discovery(
    state: &mut CoordinatorState,
    cfg: &CoordinatorConfig,
    now: MonotonicInstant,
) -> Vec<CoordinatorAction> {
    if state.phase != CoordinatorPhase::Discovering {
        return Vec::new();
    }
    let due = match state.t_phase_start {
        None => true,
        Some(last) => now.duration_since_micros(last) >= cfg.ping_interval_micros,
    };
    if !due {
        return Vec::new();
    }
    if state.discovery_rounds_remaining == 0 {
        info!(
            "[coordinator] discovery complete, {} node(s) found",
            state.nodes.len()
        );
        state.phase = CoordinatorPhase::DistributingTopology;
        state.t_phase_start = Some(now);
        return Vec::new();
    }

    state.discovery_rounds_remaining -= 1;
    state.t_phase_start = Some(now);
    state.pings_sent += 1;
    alloc::vec![CoordinatorAction::SendMulticast(Frame::Ping)]
}

/// `pong;` from `sender`: assigns a fresh random `m` and confirms, unless
/// already known (duplicates are ignored per spec.md Sec. 4.2) or the fleet
/// is already at capacity.
pub fn on_pong(
    state: &mut CoordinatorState,
    sender: NodeId,
    rng: &mut impl Rng,
) -> Vec<CoordinatorAction> {
    if state.has_node(&sender) {
        return Vec::new();
    }
    if state.nodes.len() >= MAX_NODES {
        warn!("[coordinator] dropping pong; from {}, fleet at MAX_NODES", sender);
        return Vec::new();
    }

    let m = ElectionValue::new(rng.gen_range(1..=255)).expect("range is always 1..=255");
    info!("[coordinator] discovered {} (m={})", sender, m);
    state.nodes.push(NodeRecord::new(sender.clone(), m));
    state.recompute_min_idx();

    alloc::vec![CoordinatorAction::SendUnicast(
        sender.clone(),
        Frame::Conf {
            m,
            short_id: sender.short().into(),
        },
    )]
}
