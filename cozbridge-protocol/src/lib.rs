//! cozbridge-protocol: Wire definitions for the robot bridge
//!
//! This crate defines the JSON messages exchanged with the robot peer over
//! the websocket, the tagged argument wrappers the peer uses to deserialize
//! ambiguous values, and the binary frame format used for camera video.

pub mod frame;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use frame::{demux, BinaryFrame, CameraFrame, FrameHeader, ImageFormat, CAMERA_FRAME_EVENT};
pub use messages::{parse_peer_text, CallRequest, ClientMessage, PeerMessage, ProtocolError};
pub use types::{
    is_truthy, Arg, CallId, Light, LightPattern, PatternKind, Rgb, SongNote, StateSnapshot,
    TypedArg, TYPE_TAG,
};

/// Default peer address
pub const DEFAULT_URL: &str = "ws://localhost:26966";
