#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for dynamic allocation (e.g., Vec<u8>/String for node ids and frames)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod common;

// --- Wire protocol ---
pub mod frame;

// --- Shell control-mailbox boundary ---
pub mod control;

// --- Topology construction ---
pub mod topology;

// --- Roles ---
pub mod worker;
pub mod coordinator;

// --- Top-level Exports ---
pub use common::{ClockSync, MonotonicInstant};
pub use hal::{DatagramTransport, LeaderElectionError};
pub use types::{ElectionValue, NodeId, Topology};
pub use frame::codec::{Codec, Frame, decode_frame};
pub use control::{ControlCommand, ControlMailbox, ControlParseError, parse_control_command};
pub use worker::{WorkerAction, WorkerSession};
pub use coordinator::{CoordinatorAction, ExperimentDriver};
