// crates/leader-election-core/src/worker/reporter.rs
//! Result-reporting retry logic (spec.md Sec. 4.4 "Starting"/"Collecting"):
//! a terminated worker resends `results;` until the coordinator confirms with
//! `rconf;` or it gives up after `max_result_attempts`. Grounded on the
//! teacher's SDO-style retry loop (`sdo/sequence_handler.rs`'s retransmit
//! timer) generalized from a fixed SDO retry count to a configurable one.

use super::state::{Phase, WorkerAction, WorkerConfig, WorkerState};
use crate::common::MonotonicInstant;
use crate::frame::codec::Frame;
use log::{info, warn};

/// Called from `WorkerSession::tick` whenever `phase == Reporting`. Resends
/// `results;` at `result_retry_interval_micros` until confirmed or exhausted.
pub fn on_tick(state: &mut WorkerState, cfg: &WorkerConfig, now: MonotonicInstant) -> alloc::vec::Vec<WorkerAction> {
    if state.result_confirmed {
        state.phase = Phase::Done;
        return alloc::vec::Vec::new();
    }

    if state.result_attempts >= cfg.max_result_attempts {
        warn!(
            "[worker {}] gave up on results; after {} attempts, moving to Done unconfirmed",
            state.my_id, state.result_attempts
        );
        state.phase = Phase::Done;
        return alloc::vec::Vec::new();
    }

    let due = match state.last_result_send {
        None => true,
        Some(last) => now.duration_since_micros(last) >= cfg.result_retry_interval_micros,
    };
    if !due {
        return alloc::vec::Vec::new();
    }

    let Some(coordinator_id) = state.coordinator_id.clone() else {
        warn!(
            "[worker {}] terminated with no known coordinator; cannot report results",
            state.my_id
        );
        state.phase = Phase::Done;
        return alloc::vec::Vec::new();
    };

    let (start_wall_sec, elapsed_seconds) = match (state.clock_sync, state.t_election_start, state.t_election_end) {
        (Some(sync), Some(start), Some(end)) => {
            let (wall_sec, _) = sync.to_wall_clock(start);
            let elapsed = end.duration_since_micros(start) as f64 / 1_000_000.0;
            (wall_sec, elapsed)
        }
        _ => (0, 0.0),
    };

    let frame = Frame::Results {
        leader: state.leader.clone(),
        start_wall_sec,
        elapsed_seconds,
        msgs: state.msgs_total(),
        degree: state.degree() as u32,
    };

    state.result_attempts += 1;
    state.last_result_send = Some(now);
    state.msgs_out += 1;

    info!(
        "[worker {}] reporting results (attempt {}/{})",
        state.my_id, state.result_attempts, cfg.max_result_attempts
    );

    alloc::vec![WorkerAction::SendUnicast(coordinator_id, frame)]
}

/// `rconf;`: the coordinator's acknowledgement of a received `results;`.
pub fn on_rconf(state: &mut WorkerState) {
    state.result_confirmed = true;
    state.phase = Phase::Done;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ClockSync;
    use crate::types::{ElectionValue, NodeId};

    fn reporting_state() -> WorkerState {
        let mut s = WorkerState::new(NodeId::from_short("w1"));
        s.coordinator_id = Some(NodeId::from_short("coord"));
        s.leader = NodeId::from_short("w2");
        s.phase = Phase::Reporting;
        s.my_m = ElectionValue::new(5).unwrap();
        s.t_election_start = Some(MonotonicInstant::from_micros(0));
        s.t_election_end = Some(MonotonicInstant::from_micros(2_000_000));
        s.clock_sync = Some(ClockSync::new(1_700_000_000, MonotonicInstant::from_micros(0)));
        s
    }

    #[test]
    fn first_tick_sends_results_immediately() {
        let mut s = reporting_state();
        let cfg = WorkerConfig::default();
        let actions = on_tick(&mut s, &cfg, MonotonicInstant::from_micros(0));
        assert_eq!(actions.len(), 1);
        assert_eq!(s.result_attempts, 1);
    }

    #[test]
    fn does_not_resend_before_retry_interval_elapses() {
        let mut s = reporting_state();
        let cfg = WorkerConfig::default();
        on_tick(&mut s, &cfg, MonotonicInstant::from_micros(0));
        let actions = on_tick(&mut s, &cfg, MonotonicInstant::from_micros(100));
        assert!(actions.is_empty());
        assert_eq!(s.result_attempts, 1);
    }

    #[test]
    fn rconf_marks_confirmed_and_done() {
        let mut s = reporting_state();
        on_rconf(&mut s);
        assert!(s.result_confirmed);
        assert_eq!(s.phase, Phase::Done);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut s = reporting_state();
        let mut cfg = WorkerConfig::default();
        cfg.max_result_attempts = 1;
        cfg.result_retry_interval_micros = 0;
        on_tick(&mut s, &cfg, MonotonicInstant::from_micros(0));
        on_tick(&mut s, &cfg, MonotonicInstant::from_micros(1));
        assert_eq!(s.phase, Phase::Done);
        assert!(!s.result_confirmed);
    }
}
