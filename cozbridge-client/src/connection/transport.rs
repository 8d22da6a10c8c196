//! Websocket transport to the robot peer

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use cozbridge_protocol::{demux, parse_peer_text, ClientMessage, ProtocolError};

use super::handler::MessageHandler;
use crate::config::ReconnectConfig;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

struct Link {
    state: ConnectionState,
    /// Writer channel of the live socket; present only while Open
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    /// Consecutive failed connect attempts
    failures: u32,
}

struct Inner {
    url: String,
    reconnect: ReconnectConfig,
    handler: Arc<dyn MessageHandler>,
    verbose: Arc<AtomicBool>,
    link: Mutex<Link>,
    shutdown: CancellationToken,
    connect_attempts: AtomicU64,
}

/// Owner of the single socket to the peer
///
/// Cheap to clone; clones share the same connection. At most one socket is
/// live at a time: `connect` does nothing while a connection is being
/// established or is open. Lost connections are retried at a fixed interval.
///
/// `connect`, `send` and `send_with_retry` spawn tasks and must be called
/// from within a Tokio runtime.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    pub fn new(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
        handler: Arc<dyn MessageHandler>,
        verbose: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                reconnect,
                handler,
                verbose,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    outgoing: None,
                    failures: 0,
                }),
                shutdown: CancellationToken::new(),
                connect_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of connection attempts started so far
    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Start connecting unless already connecting, open, or shut down
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Transmit a message if the socket is open
    ///
    /// Returns false when it is not, and starts a connection attempt.
    pub fn send(&self, msg: &ClientMessage) -> bool {
        match encode(msg) {
            Some(text) => self.inner.send_text(text),
            None => false,
        }
    }

    /// Send, and if that fails try exactly once more after `delay`
    ///
    /// Returns the result of the first attempt.
    pub fn send_with_retry(&self, msg: &ClientMessage, delay: Duration) -> bool {
        let Some(text) = encode(msg) else {
            return false;
        };
        if self.inner.send_text(text.clone()) {
            return true;
        }

        let inner = Arc::clone(&self.inner);
        let command = msg.command();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if inner.send_text(text) {
                        tracing::debug!(command, "Delayed resend succeeded");
                    } else {
                        tracing::debug!(command, "Delayed resend failed, giving up");
                    }
                }
            }
        });
        false
    }

    /// Close the socket and stop reconnecting
    ///
    /// A transport that has been shut down cannot be reconnected.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

fn encode(msg: &ClientMessage) -> Option<String> {
    match msg.to_text() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(command = msg.command(), error = %e, "Failed to encode message");
            None
        }
    }
}

impl Inner {
    fn connect(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        {
            let mut link = self.link.lock();
            if link.state != ConnectionState::Disconnected {
                return;
            }
            link.state = ConnectionState::Connecting;
        }

        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(url = %self.url, attempt, "Connecting to robot peer");
        tokio::spawn(Arc::clone(self).connection_task());
    }

    fn send_text(self: &Arc<Self>, text: String) -> bool {
        let sent = {
            let link = self.link.lock();
            match (link.state, &link.outgoing) {
                (ConnectionState::Open, Some(tx)) => tx.send(Message::Text(text)).is_ok(),
                _ => false,
            }
        };

        if !sent {
            tracing::warn!("Websocket not connected, trying to connect");
            self.connect();
        }
        sent
    }

    fn schedule_reconnect(self: &Arc<Self>, failures: u32) {
        if self.shutdown.is_cancelled() {
            return;
        }
        if let Some(max) = self.reconnect.max_attempts {
            if failures >= max {
                tracing::warn!(
                    url = %self.url,
                    failures,
                    "Giving up reconnecting until the next send"
                );
                return;
            }
        }

        let inner = Arc::clone(self);
        let delay = self.reconnect.interval();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => inner.connect(),
            }
        });
    }

    /// Background task that owns one socket from connect to close
    async fn connection_task(self: Arc<Self>) {
        let connected = tokio::select! {
            _ = self.shutdown.cancelled() => {
                self.link.lock().state = ConnectionState::Disconnected;
                return;
            }
            result = connect_async(self.url.as_str()) => result,
        };

        let ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Websocket connect failed");
                let failures = {
                    let mut link = self.link.lock();
                    link.state = ConnectionState::Disconnected;
                    link.failures += 1;
                    link.failures
                };
                self.schedule_reconnect(failures);
                return;
            }
        };

        let (tx, mut outgoing) = mpsc::unbounded_channel();
        {
            let mut link = self.link.lock();
            link.state = ConnectionState::Open;
            link.outgoing = Some(tx);
            link.failures = 0;
        }
        tracing::info!(url = %self.url, "Connected to robot peer");
        self.handler.on_connected();

        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                // Handle outgoing messages
                Some(msg) = outgoing.recv() => {
                    if let Err(e) = sink.send(msg).await {
                        tracing::warn!(error = %e, "Failed to send message");
                        break;
                    }
                }

                // Handle incoming messages
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Websocket closed by peer");
                            break;
                        }
                        Some(Ok(msg)) => self.dispatch(msg),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Websocket error");
                            break;
                        }
                        None => {
                            tracing::info!("Websocket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        {
            let mut link = self.link.lock();
            link.state = ConnectionState::Disconnected;
            link.outgoing = None;
        }
        self.handler.on_disconnected();
        self.schedule_reconnect(0);
    }

    /// Route one incoming message; runs to completion before the next is read
    fn dispatch(&self, msg: Message) {
        match msg {
            Message::Text(text) => match parse_peer_text(&text) {
                Ok(parsed) => self.handler.handle(parsed),
                Err(e) => self.malformed(&e, &text),
            },
            Message::Binary(raw) => match demux(Bytes::from(raw)) {
                Ok(frame) => {
                    let event = frame.header.event.clone();
                    match frame.into_camera_frame() {
                        Some(camera) => self.handler.handle_frame(camera),
                        None => tracing::trace!(event, "Ignoring binary event"),
                    }
                }
                Err(e) => self.malformed(&e, "<binary>"),
            },
            // Pings are answered by tungstenite
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_) => {}
        }
    }

    fn malformed(&self, error: &ProtocolError, raw: &str) {
        if self.verbose.load(Ordering::Relaxed) {
            tracing::info!(error = %error, raw, "Ignoring malformed message");
        }
    }
}
