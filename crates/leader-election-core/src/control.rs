// crates/leader-election-core/src/control.rs
//! The coordinator's shell control-mailbox boundary (spec.md Sec. 6:
//! "Coordinator shell commands"; SPEC_FULL.md Sec. 4 "Shell/control-mailbox
//! commands"). `sync <unix_ts>` and `rounds <n>` are the only two commands;
//! each line is parsed into a `ControlCommand` and delivered through a
//! bounded mailbox, matching spec.md Sec. 5's "optional helper threads ...
//! communicate via a bounded mailbox (16-128 slots)" — the interactive
//! shell itself lives outside this crate's scope (spec.md Sec. 1), this is
//! only the queue and the line grammar it is fed.

use alloc::collections::VecDeque;
use alloc::string::ToString;
use core::fmt;

/// One parsed shell command destined for the coordinator's control mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `sync <unix_ts>` — one-shot wall-clock sync (spec.md Sec. 6).
    Sync(u32),
    /// `rounds <n>` — discovery round count override (spec.md Sec. 6).
    Rounds(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlParseError {
    Empty,
    UnknownCommand,
    MissingArgument,
    InvalidArgument,
}

impl fmt::Display for ControlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command line"),
            Self::UnknownCommand => write!(f, "unknown shell command"),
            Self::MissingArgument => write!(f, "missing command argument"),
            Self::InvalidArgument => write!(f, "command argument could not be parsed"),
        }
    }
}

/// Parses one line of shell input into a `ControlCommand`.
///
/// Grammar is deliberately minimal: `<command> <arg>`, whitespace-separated,
/// matching the two commands spec.md Sec. 6 names. Anything else is a
/// malformed-input error, handled the same way as a malformed wire frame
/// (spec.md Sec. 7): logged and dropped by the caller, never a panic.
pub fn parse_control_command(line: &str) -> Result<ControlCommand, ControlParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ControlParseError::Empty);
    }
    let mut parts = line.split_whitespace();
    let cmd = parts.next().ok_or(ControlParseError::Empty)?;
    let arg = parts.next().ok_or(ControlParseError::MissingArgument)?;
    match cmd {
        "sync" => arg
            .parse::<u32>()
            .map(ControlCommand::Sync)
            .map_err(|_| ControlParseError::InvalidArgument),
        "rounds" => arg
            .parse::<u32>()
            .map(ControlCommand::Rounds)
            .map_err(|_| ControlParseError::InvalidArgument),
        _ => Err(ControlParseError::UnknownCommand),
    }
}

/// Renders the single-line wire-style acknowledgement the original shell
/// emits back into its own control channel for each command (spec.md
/// Sec. 6: `unix;<ts>;` / `rounds;<n>;`).
pub fn ack_line(cmd: ControlCommand) -> alloc::string::String {
    match cmd {
        ControlCommand::Sync(ts) => alloc::format!("unix;{};", ts),
        ControlCommand::Rounds(n) => alloc::format!("rounds;{};", n),
    }
    .to_string()
}

/// A fixed-capacity FIFO mailbox for control commands (spec.md Sec. 5:
/// "each such mailbox has capacity equivalent to the source's queue sizes
/// (16-128 slots)"). `push` drops the newest command and reports failure
/// rather than growing unbounded or evicting an older, possibly still-
/// relevant command.
pub struct ControlMailbox {
    queue: VecDeque<ControlCommand>,
    capacity: usize,
}

impl ControlMailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Attempts to enqueue `cmd`. Returns it back on a full mailbox.
    pub fn push(&mut self, cmd: ControlCommand) -> Result<(), ControlCommand> {
        if self.queue.len() >= self.capacity {
            return Err(cmd);
        }
        self.queue.push_back(cmd);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<ControlCommand> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
