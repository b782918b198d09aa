// crates/leader-election-core/src/frame/mod.rs
//! The framed text wire protocol tying workers and the coordinator together.

pub mod codec;

pub use codec::{Codec, Frame, FrameCodecError, decode_frame};
