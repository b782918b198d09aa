//! Worker binary: runs one node's `WorkerSession` to completion, driven by
//! a non-blocking `UdpIpv6Transport`. Grounded on the teacher's
//! `examples/linux/cn_listener.rs` outer-loop shape (poll transport, run one
//! cycle, execute any returned action, repeat) generalized from
//! `ControlledNode::run_cycle` to `WorkerSession::process_raw_frame`/`tick`.

use clap::Parser;
use leader_election_core::common::{ClockSync, MonotonicInstant};
use leader_election_core::worker::{WorkerAction, WorkerConfig, WorkerSession};
use leader_election_core::{Codec, DatagramTransport};
use leader_election_net::UdpIpv6Transport;
use log::{error, info, warn};
use std::net::Ipv6Addr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "worker", version, about = "Leader-election worker node")]
struct Args {
    /// This node's link-local IPv6 address (e.g. fe80::1).
    #[arg(long)]
    local_addr: Ipv6Addr,

    /// Numeric interface index used to disambiguate the link-local scope.
    #[arg(long)]
    scope_id: u32,

    /// UDP port shared by every node (spec.md Sec. 6).
    #[arg(long, default_value_t = leader_election_core::types::DEFAULT_PORT)]
    port: u16,

    /// Stability counter K (spec.md Sec. 3, 4.5 REDESIGN FLAGS).
    #[arg(long, default_value_t = 5)]
    k: i32,

    /// Per-round wait interval T in seconds, used for both AwaitResponses
    /// and Poll (spec.md Sec. 4.5, 9).
    #[arg(long, default_value_t = 3)]
    t_seconds: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let transport = UdpIpv6Transport::bind(args.local_addr, args.scope_id, args.port)?;
    let my_id = transport.local_node_id();
    info!("worker {} listening on [{}]:{}", my_id, args.local_addr, args.port);

    let config = WorkerConfig::new(args.k, args.t_seconds * 1_000_000);
    let mut session = WorkerSession::new(my_id, config);

    let unix_epoch_at_start = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    session.state.clock_sync = Some(ClockSync::new(unix_epoch_at_start, MonotonicInstant::from_micros(0)));

    run(transport, session)
}

fn run(mut transport: UdpIpv6Transport, mut session: WorkerSession) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut buf = [0u8; leader_election_core::frame::codec::MAX_FRAME_SIZE];

    loop {
        let now = MonotonicInstant::from_micros(start.elapsed().as_micros() as u64);

        match transport.recv(&mut buf) {
            Ok(Some((len, sender))) => match session.process_raw_frame(sender.clone(), &buf[..len], now) {
                Ok(actions) => execute(&mut transport, actions),
                Err(e) => warn!("dropping malformed frame from {}: {}", sender, e),
            },
            Ok(None) => {}
            Err(e) => error!("transport error: {}", e),
        }

        let actions = session.tick(now);
        execute(&mut transport, actions);
    }
}

fn execute(transport: &mut UdpIpv6Transport, actions: Vec<WorkerAction>) {
    for action in actions {
        let result = match &action {
            WorkerAction::SendUnicast(dest, frame) => frame
                .encode()
                .map_err(leader_election_core::LeaderElectionError::from)
                .and_then(|bytes| transport.send_unicast(dest, &bytes)),
            WorkerAction::SendMulticast(frame) => frame
                .encode()
                .map_err(leader_election_core::LeaderElectionError::from)
                .and_then(|bytes| transport.send_multicast(&bytes)),
        };
        if let Err(e) = result {
            error!("failed to execute {:?}: {}", action, e);
        }
    }
}
