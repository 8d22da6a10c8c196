//! Message handler trait

use cozbridge_protocol::{CameraFrame, PeerMessage};

/// Receives everything the transport reads from the peer
///
/// Methods run on the connection task, one message at a time and in arrival
/// order. They must not block or await.
pub trait MessageHandler: Send + Sync {
    /// Handle a parsed text message
    fn handle(&self, msg: PeerMessage);

    /// Handle a camera frame from a binary message
    fn handle_frame(&self, _frame: CameraFrame) {}

    /// Called when connection is established
    fn on_connected(&self) {}

    /// Called when connection is lost
    fn on_disconnected(&self) {}
}
