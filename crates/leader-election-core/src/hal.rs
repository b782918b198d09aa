// crates/leader-election-core/src/hal.rs
use crate::frame::codec::FrameCodecError;
use crate::types::{ElectionValueError, NodeId};
use core::fmt;

/// A portable, descriptive error type for the leader-election protocol
/// stack, analogous in shape to the teacher crate's `PowerlinkError`: one
/// variant per failure class, never a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderElectionError {
    /// The provided buffer is too small for the operation.
    BufferTooShort,
    /// An underlying transport I/O error occurred.
    IoError,
    /// A frame could not be parsed (bad kind, missing field, unparsable
    /// integer, wrong number of fields).
    MalformedFrame,
    /// The frame exceeds the maximum wire size.
    FrameTooLarge,
    /// The frame's kind tag is not one this stack understands.
    UnknownFrameKind,
    /// A received election value was outside 1..=255.
    InvalidElectionValue(u16),
    /// A node id string could not be resolved to a real peer.
    InvalidNodeId,
    /// The component is not yet in a state where this operation is valid.
    NotReady,
    /// Internal invariant violation; should never be reachable in practice.
    InternalError(&'static str),
}

impl fmt::Display for LeaderElectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort => write!(f, "buffer is too short"),
            Self::IoError => write!(f, "underlying transport I/O error"),
            Self::MalformedFrame => write!(f, "frame could not be parsed"),
            Self::FrameTooLarge => write!(f, "frame exceeds the maximum wire size"),
            Self::UnknownFrameKind => write!(f, "unknown frame kind"),
            Self::InvalidElectionValue(v) => write!(f, "invalid election value: {}", v),
            Self::InvalidNodeId => write!(f, "invalid or unresolvable node id"),
            Self::NotReady => write!(f, "component not ready for this operation"),
            Self::InternalError(s) => write!(f, "internal error: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LeaderElectionError {}

impl From<FrameCodecError> for LeaderElectionError {
    fn from(e: FrameCodecError) -> Self {
        match e {
            FrameCodecError::FrameTooLarge => LeaderElectionError::FrameTooLarge,
            FrameCodecError::MalformedFrame | FrameCodecError::InvalidField => {
                LeaderElectionError::MalformedFrame
            }
            FrameCodecError::UnknownKind => LeaderElectionError::UnknownFrameKind,
        }
    }
}

impl From<ElectionValueError> for LeaderElectionError {
    fn from(e: ElectionValueError) -> Self {
        match e {
            ElectionValueError::OutOfRange(v) => LeaderElectionError::InvalidElectionValue(v),
        }
    }
}

/// Hardware/OS abstraction for datagram transport.
///
/// This is the only seam the protocol core depends on for network I/O,
/// playing the role the teacher crate's `NetworkInterface` trait plays for
/// raw Ethernet frames: it lets `leader-election-core` stay free of any
/// concrete socket type (and `no_std`-clean) while `leader-election-net`
/// supplies a real UDP/IPv6 implementation.
///
/// Node identity rather than a raw socket address is used at this boundary:
/// the short form of a `NodeId` is exactly the information a transport needs
/// to reconstruct the peer's full link-local address (`fe80::<short>`), so
/// the core never needs to know about `SocketAddr`, scope ids, or interface
/// names.
pub trait DatagramTransport {
    /// Sends a unicast frame to a specific peer.
    fn send_unicast(&mut self, dest: &NodeId, frame: &[u8]) -> Result<(), LeaderElectionError>;

    /// Sends a frame to the link-local all-nodes multicast group.
    fn send_multicast(&mut self, frame: &[u8]) -> Result<(), LeaderElectionError>;

    /// Attempts to receive a single datagram into `buffer` without blocking
    /// beyond the transport's configured short timeout.
    ///
    /// Returns `Ok(None)` on a read timeout (the common case in the
    /// cooperative poll loop), `Ok(Some((len, sender)))` on a received
    /// datagram, or `Err` on a genuine I/O failure.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, NodeId)>, LeaderElectionError>;

    /// The `NodeId` of this transport's own interface.
    fn local_node_id(&self) -> NodeId;
}
