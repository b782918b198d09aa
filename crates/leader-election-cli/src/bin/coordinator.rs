//! Coordinator binary: drives an `ExperimentDriver` through `MAX_EXP`
//! discover/start/collect/reset iterations over a non-blocking
//! `UdpIpv6Transport`, and prints the per-iteration CSV block to stdout
//! (spec.md Sec. 4.4, 6). Grounded on the same outer-loop shape as
//! `bin/worker.rs`; the only addition is a background stdin reader feeding
//! the `sync`/`rounds` shell commands into the driver (SPEC_FULL.md Sec. 4
//! "Shell/control-mailbox commands").

use clap::Parser;
use leader_election_core::coordinator::{CoordinatorAction, CoordinatorConfig, ExperimentDriver};
use leader_election_core::common::MonotonicInstant;
use leader_election_core::control::parse_control_command;
use leader_election_core::{Codec, ControlCommand, ControlMailbox, DatagramTransport, Topology};
use leader_election_net::UdpIpv6Transport;
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::net::Ipv6Addr;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

/// Capacity of the coordinator's shell control mailbox (spec.md Sec. 5:
/// "16-128 slots").
const CONTROL_MAILBOX_CAPACITY: usize = 32;

#[derive(Parser, Debug)]
#[command(name = "coordinator", version, about = "Leader-election experiment coordinator")]
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

    /// Neighbor topology to induce over the discovered fleet (spec.md Sec. 4.3).
    #[arg(long, default_value = "ring")]
    topology: Topology,

    /// Discovery round count (spec.md Sec. 4.2; overridable at runtime via
    /// the `rounds <n>` shell command until the coordinator is synced).
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Number of experiment iterations to run (spec.md Sec. 3 `MAX_EXP`).
    #[arg(long, default_value_t = 10)]
    max_exp: u32,

    /// Optional path to mirror every logged CSV/summary line to, in
    /// addition to stdout (SPEC_FULL.md Sec. 4 supplemented feature).
    #[arg(long)]
    csv_out: Option<std::path::PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let transport = UdpIpv6Transport::bind(args.local_addr, args.scope_id, args.port)?;
    info!(
        "coordinator listening on [{}]:{} (topology={}, rounds={}, max_exp={})",
        args.local_addr, args.port, args.topology, args.rounds, args.max_exp
    );

    let mut config = CoordinatorConfig::new(args.topology);
    config.discovery_rounds = args.rounds;
    config.max_exp = args.max_exp;
    let driver = ExperimentDriver::new(config);

    let csv_file = args
        .csv_out
        .as_ref()
        .map(|path| OpenOptions::new().create(true).append(true).open(path))
        .transpose()?;

    let control_rx = spawn_stdin_reader();
    run(transport, driver, control_rx, csv_file)
}

/// Reads shell command lines from stdin on a background thread and forwards
/// them over a channel, so the outer loop's own poll never blocks on stdin
/// (spec.md Sec. 5: "every wait has a deadline").
fn spawn_stdin_reader() -> Receiver<ControlCommand> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_control_command(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("ignoring malformed shell command {:?}: {}", line, e),
            }
        }
    });
    rx
}

fn run(
    mut transport: UdpIpv6Transport,
    mut driver: ExperimentDriver,
    control_rx: Receiver<ControlCommand>,
    mut csv_file: Option<std::fs::File>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut buf = [0u8; leader_election_core::frame::codec::MAX_FRAME_SIZE];
    let mut rng = rand::thread_rng();
    let mut mailbox = ControlMailbox::new(CONTROL_MAILBOX_CAPACITY);

    loop {
        let now = MonotonicInstant::from_micros(start.elapsed().as_micros() as u64);

        // Drain whatever the stdin reader produced since the last pass into
        // the bounded mailbox, then drain the mailbox into the driver — a
        // full mailbox drops the newest command rather than blocking here.
        while let Ok(cmd) = control_rx.try_recv() {
            if let Err(dropped) = mailbox.push(cmd) {
                warn!("control mailbox full, dropping {:?}", dropped);
            }
        }
        while let Some(cmd) = mailbox.pop() {
            apply_control_command(&mut driver, cmd, now);
        }

        match transport.recv(&mut buf) {
            Ok(Some((len, sender))) => {
                match driver.process_raw_frame(sender.clone(), &buf[..len], now, &mut rng) {
                    Ok(actions) => execute(&mut transport, &mut csv_file, actions),
                    Err(e) => warn!("dropping malformed frame from {}: {}", sender, e),
                }
            }
            Ok(None) => {}
            Err(e) => error!("transport error: {}", e),
        }

        let actions = driver.tick(now);
        let finished = driver.is_experiment_finished();
        execute(&mut transport, &mut csv_file, actions);

        if finished {
            info!(
                "experiment finished: {} correct, {} failed",
                driver.state.correct_runs, driver.state.failed_runs
            );
            return Ok(());
        }
    }
}

fn apply_control_command(driver: &mut ExperimentDriver, cmd: ControlCommand, now: MonotonicInstant) {
    match cmd {
        ControlCommand::Sync(ts) => match driver.handle_sync(ts, now) {
            Ok(()) => info!("clock synced to unix epoch {}", ts),
            Err(e) => warn!("sync rejected: {}", e),
        },
        ControlCommand::Rounds(n) => match driver.handle_rounds(n) {
            Ok(()) => info!("discovery rounds set to {}", n),
            Err(e) => warn!("rounds rejected: {}", e),
        },
    }
}

fn execute(
    transport: &mut UdpIpv6Transport,
    csv_file: &mut Option<std::fs::File>,
    actions: Vec<CoordinatorAction>,
) {
    for action in actions {
        match action {
            CoordinatorAction::SendUnicast(dest, frame) => {
                let result = frame
                    .encode()
                    .map_err(leader_election_core::LeaderElectionError::from)
                    .and_then(|bytes| transport.send_unicast(&dest, &bytes));
                if let Err(e) = result {
                    error!("failed to send frame to {}: {}", dest, e);
                }
            }
            CoordinatorAction::SendMulticast(frame) => {
                let result = frame
                    .encode()
                    .map_err(leader_election_core::LeaderElectionError::from)
                    .and_then(|bytes| transport.send_multicast(&bytes));
                if let Err(e) = result {
                    error!("failed to send multicast frame: {}", e);
                }
            }
            CoordinatorAction::Log(line) => {
                println!("{}", line);
                if let Some(file) = csv_file.as_mut() {
                    if let Err(e) = writeln!(file, "{}", line) {
                        error!("failed to write csv-out line: {}", e);
                    }
                }
            }
        }
    }
}
