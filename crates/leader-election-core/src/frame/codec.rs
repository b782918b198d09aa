// crates/leader-election-core/src/frame/codec.rs
//! The wire codec: `;`-delimited ASCII frames, always trailing-`;`
//! terminated (spec.md Sec. 4.1).
//!
//! Rather than the original implementation's raw string splicing, frames are
//! parsed directly into a tagged `Frame` enum at the boundary; the state
//! machines downstream never see semicolons or field offsets (spec.md Sec. 9,
//! "String-packed frames -> tagged structured messages").

use crate::types::{ElectionValue, NodeId};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Frames larger than this are discarded as oversize (spec.md Sec. 4.1
/// recommends 256-512 bytes; the largest legitimate frame is an `ips;` frame
/// naming `MAX_NEIGHBORS` full addresses).
pub const MAX_FRAME_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodecError {
    FrameTooLarge,
    MalformedFrame,
    UnknownKind,
    InvalidField,
}

/// A cursor over `;`-delimited text, mirroring spec.md's
/// `extract_segment(cursor) -> field`: each call advances past the next `;`
/// and returns the slice before it, yielding an empty field once the cursor
/// is exhausted.
pub struct FieldCursor<'a> {
    buf: &'a str,
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    pub fn new(buf: &'a str) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn extract_segment(&mut self) -> &'a str {
        if self.pos >= self.buf.len() {
            return "";
        }
        let rest = &self.buf[self.pos..];
        match rest.find(';') {
            Some(idx) => {
                let seg = &rest[..idx];
                self.pos += idx + 1;
                seg
            }
            None => {
                // No trailing `;` on this remainder: treat the whole
                // remainder as malformed tail and consume it.
                self.pos = self.buf.len();
                rest
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Appends `kind` and each field to a buffer, each one followed by a
/// trailing `;` (spec.md Sec. 4.1: `encode(kind, fields...) -> bytes`).
pub fn encode_raw(kind: &str, fields: &[&str]) -> Result<Vec<u8>, FrameCodecError> {
    let mut out = String::with_capacity(kind.len() + 1 + fields.iter().map(|f| f.len() + 1).sum::<usize>());
    out.push_str(kind);
    out.push(';');
    for field in fields {
        if field.contains(';') {
            return Err(FrameCodecError::InvalidField);
        }
        out.push_str(field);
        out.push(';');
    }
    if out.len() > MAX_FRAME_SIZE {
        return Err(FrameCodecError::FrameTooLarge);
    }
    Ok(out.into_bytes())
}

/// Splits a raw datagram into its kind tag and a field cursor over the rest.
pub fn decode_raw(bytes: &[u8]) -> Result<(&str, FieldCursor<'_>), FrameCodecError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(FrameCodecError::FrameTooLarge);
    }
    let text = core::str::from_utf8(bytes).map_err(|_| FrameCodecError::MalformedFrame)?;
    let mut cursor = FieldCursor::new(text);
    let kind = cursor.extract_segment();
    if kind.is_empty() {
        return Err(FrameCodecError::MalformedFrame);
    }
    Ok((kind, cursor))
}

/// A trait for wire objects that can be serialized into and deserialized
/// from the `;`-delimited frame format.
pub trait Codec: Sized {
    fn encode(&self) -> Result<Vec<u8>, FrameCodecError>;
    fn decode(bytes: &[u8]) -> Result<Self, FrameCodecError>;
}

/// Every frame kind in the wire catalogue (spec.md Sec. 6).
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `ping;` — C -> W multicast, discovery.
    Ping,
    /// `pong;` — W -> C unicast, discovery response.
    Pong,
    /// `conf;<m>;<short_id>;` — C -> W unicast, confirms assigned `m`.
    Conf { m: ElectionValue, short_id: String },
    /// `ips;<n1>;...;` — C -> W unicast, ordered neighbor list.
    Ips { neighbors: Vec<NodeId> },
    /// `discover;` — C -> W unicast, triggers general-topology neighbor
    /// solicitation.
    Discover,
    /// `disc;` — W -> W multicast, general-topology neighbor solicitation.
    Disc,
    /// `start;` — C -> W multi/unicast, begins the election.
    Start,
    /// `le_ack;<m>;<owner_id>;` — W -> W, election value exchange.
    LeAck { m: ElectionValue, owner: NodeId },
    /// `le_m?;` — W -> W unicast, request a neighbor's current value.
    LeM,
    /// `results;<leader>;<start_sec>;<elapsed_frac>;<msgs>;<degree>;` — W -> C
    /// unicast.
    Results {
        leader: NodeId,
        start_wall_sec: u32,
        elapsed_seconds: f64,
        msgs: u32,
        degree: u32,
    },
    /// `rconf;` — C -> W unicast, confirms receipt of `results;`.
    Rconf,
    /// `failure;` — either direction, aborts the current iteration.
    Failure,
}

fn parse_u32(field: &str) -> Result<u32, FrameCodecError> {
    field.parse::<u32>().map_err(|_| FrameCodecError::InvalidField)
}

fn parse_f64(field: &str) -> Result<f64, FrameCodecError> {
    field.parse::<f64>().map_err(|_| FrameCodecError::InvalidField)
}

fn parse_election_value(field: &str) -> Result<ElectionValue, FrameCodecError> {
    let raw: u16 = field.parse().map_err(|_| FrameCodecError::InvalidField)?;
    ElectionValue::new(raw).map_err(|_| FrameCodecError::InvalidField)
}

impl Codec for Frame {
    fn encode(&self) -> Result<Vec<u8>, FrameCodecError> {
        match self {
            Frame::Ping => encode_raw("ping", &[]),
            Frame::Pong => encode_raw("pong", &[]),
            Frame::Conf { m, short_id } => {
                let m_field = m.get().to_string();
                encode_raw("conf", &[&m_field, short_id])
            }
            Frame::Ips { neighbors } => {
                let fields: Vec<String> = neighbors.iter().map(|n| n.full().to_string()).collect();
                let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
                encode_raw("ips", &refs)
            }
            Frame::Discover => encode_raw("discover", &[]),
            Frame::Disc => encode_raw("disc", &[]),
            Frame::Start => encode_raw("start", &[]),
            Frame::LeAck { m, owner } => {
                let m_field = m.get().to_string();
                encode_raw("le_ack", &[&m_field, owner.full()])
            }
            Frame::LeM => encode_raw("le_m?", &[]),
            Frame::Results {
                leader,
                start_wall_sec,
                elapsed_seconds,
                msgs,
                degree,
            } => {
                let start_field = start_wall_sec.to_string();
                let elapsed_field = elapsed_seconds.to_string();
                let msgs_field = msgs.to_string();
                let degree_field = degree.to_string();
                encode_raw(
                    "results",
                    &[
                        leader.full(),
                        &start_field,
                        &elapsed_field,
                        &msgs_field,
                        &degree_field,
                    ],
                )
            }
            Frame::Rconf => encode_raw("rconf", &[]),
            Frame::Failure => encode_raw("failure", &[]),
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, FrameCodecError> {
        let (kind, mut cursor) = decode_raw(bytes)?;
        match kind {
            "ping" => Ok(Frame::Ping),
            "pong" => Ok(Frame::Pong),
            "conf" => {
                let m = parse_election_value(cursor.extract_segment())?;
                let short_id = cursor.extract_segment().to_string();
                if short_id.is_empty() {
                    return Err(FrameCodecError::MalformedFrame);
                }
                Ok(Frame::Conf { m, short_id })
            }
            "ips" => {
                let mut neighbors = Vec::new();
                loop {
                    let field = cursor.extract_segment();
                    if field.is_empty() {
                        break;
                    }
                    if neighbors.len() >= crate::types::MAX_NEIGHBORS {
                        // Defensive bound against a truncated/malformed `ips;`
                        // frame naming more neighbors than can be tracked
                        // (grounded on original_source's `numNeighbors` guard).
                        break;
                    }
                    neighbors.push(NodeId::from_full(field));
                }
                Ok(Frame::Ips { neighbors })
            }
            "discover" => Ok(Frame::Discover),
            "disc" => Ok(Frame::Disc),
            "start" => Ok(Frame::Start),
            "le_ack" => {
                let m = parse_election_value(cursor.extract_segment())?;
                let owner_field = cursor.extract_segment();
                if owner_field.is_empty() {
                    return Err(FrameCodecError::MalformedFrame);
                }
                Ok(Frame::LeAck {
                    m,
                    owner: NodeId::from_full(owner_field),
                })
            }
            "le_m?" => Ok(Frame::LeM),
            "results" => {
                let leader_field = cursor.extract_segment();
                if leader_field.is_empty() {
                    return Err(FrameCodecError::MalformedFrame);
                }
                let leader = NodeId::from_full(leader_field);
                let start_wall_sec = parse_u32(cursor.extract_segment())?;
                let elapsed_seconds = parse_f64(cursor.extract_segment())?;
                let msgs = parse_u32(cursor.extract_segment())?;
                let degree = parse_u32(cursor.extract_segment())?;
                Ok(Frame::Results {
                    leader,
                    start_wall_sec,
                    elapsed_seconds,
                    msgs,
                    degree,
                })
            }
            "rconf" => Ok(Frame::Rconf),
            "failure" => Ok(Frame::Failure),
            _ => Err(FrameCodecError::UnknownKind),
        }
    }
}

/// Convenience wrapper matching spec.md's `decode(bytes) -> (kind,
/// iterator)` framing at the call site.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameCodecError> {
    Frame::decode(bytes)
}
