//! Connection to the robot peer
//!
//! Provides the websocket transport with fixed-interval reconnection and
//! in-order dispatch of incoming messages.

mod handler;
mod transport;

pub use handler::MessageHandler;
pub use transport::{ConnectionState, Transport};
