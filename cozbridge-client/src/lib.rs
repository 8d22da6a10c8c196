//! cozbridge-client: websocket bridge to a remote robot
//!
//! This crate provides:
//! - A reconnecting websocket transport ([`connection`] module)
//! - Call correlation for awaited remote calls ([`CallCorrelator`])
//! - A cache-first robot state store ([`StateCache`])
//! - Block operation encoding ([`encoder`] module)
//! - The [`Session`] tying them together

pub mod config;
pub mod connection;
pub mod correlator;
pub mod encoder;
pub mod prefs;
pub mod sensors;
pub mod session;
pub mod state_cache;
pub mod video;

pub use config::{BridgeConfig, ConfigLoader, ReconnectConfig};
pub use connection::{ConnectionState, MessageHandler, Transport};
pub use correlator::{CallCorrelator, CallOutcome, PendingCall};
pub use encoder::{encode, BlockArgs, EncodeError, Opcode, OutboundCommand};
pub use prefs::{OverlayPosition, Preferences, PrefsStore};
pub use sensors::{Sensor, SensorValue};
pub use session::Session;
pub use state_cache::StateCache;
pub use video::{FrameSink, LatestFrame};
