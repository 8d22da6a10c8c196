//! Camera frame sinks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use cozbridge_protocol::CameraFrame;

/// Rendering surface for camera frames
///
/// Called from the dispatch path; implementations must not block.
pub trait FrameSink: Send + Sync {
    /// Called each time the connection opens, before any frame
    fn prepare(&self) {}

    /// Replace the displayed frame
    fn present(&self, frame: CameraFrame);
}

/// Keeps only the most recent frame and lets observers subscribe to it
pub struct LatestFrame {
    tx: watch::Sender<Option<Arc<CameraFrame>>>,
    prepared: AtomicBool,
}

impl LatestFrame {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            prepared: AtomicBool::new(false),
        }
    }

    /// Receiver that sees every replacement of the latest frame
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<CameraFrame>>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.tx.borrow().clone()
    }

    /// Whether the surface has been prepared by a connection
    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for LatestFrame {
    fn prepare(&self) {
        if !self.prepared.swap(true, Ordering::AcqRel) {
            tracing::debug!("Camera surface prepared");
        }
    }

    fn present(&self, frame: CameraFrame) {
        tracing::trace!(
            bytes = frame.payload.len(),
            format = frame.format.mime_type(),
            "Camera frame"
        );
        self.tx.send_replace(Some(Arc::new(frame)));
    }
}
