//! Bridge session
//!
//! A [`Session`] owns the transport, the call correlator, the state cache,
//! the backpack light slots and the frame sink for one peer. Incoming
//! messages are routed to the component that owns them; outgoing block
//! operations are encoded, tagged with a call id, sent, and optionally
//! awaited.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use cozbridge_protocol::{CameraFrame, ClientMessage, PeerMessage, StateSnapshot};
use cozbridge_utils::Result;

use crate::config::BridgeConfig;
use crate::connection::{ConnectionState, MessageHandler, Transport};
use crate::correlator::{CallCorrelator, CallOutcome};
use crate::encoder::{encode, BackpackLights, BlockArgs, Opcode, OutboundCommand};
use crate::sensors::{Sensor, SensorValue};
use crate::state_cache::StateCache;
use crate::video::FrameSink;

struct Shared {
    config: BridgeConfig,
    correlator: CallCorrelator,
    state: StateCache,
    backpack: Mutex<BackpackLights>,
    verbose: Arc<AtomicBool>,
    frames: Arc<dyn FrameSink>,
}

/// Routes peer messages into the session's components
struct Router {
    shared: Arc<Shared>,
}

impl MessageHandler for Router {
    fn handle(&self, msg: PeerMessage) {
        match msg {
            PeerMessage::State(snapshot) => {
                let woken = self.shared.state.update(snapshot);
                tracing::trace!(woken, "State snapshot updated");
            }
            PeerMessage::CallResult { call_id, data } => {
                self.shared.correlator.resolve(&call_id, data);
            }
            PeerMessage::Ack { cmd } => {
                tracing::trace!(?cmd, "Peer acknowledged command");
            }
            PeerMessage::Event { name, .. } => {
                tracing::debug!(event = %name, "Ignoring peer event");
            }
        }
    }

    fn handle_frame(&self, frame: CameraFrame) {
        self.shared.frames.present(frame);
    }

    fn on_connected(&self) {
        self.shared.frames.prepare();
    }

    fn on_disconnected(&self) {
        if self.shared.config.calls.fail_pending_on_disconnect {
            let failed = self.shared.correlator.fail_all();
            if failed > 0 {
                tracing::info!(failed, "Failed pending calls after connection loss");
            }
        } else {
            let pending = self.shared.correlator.pending_count();
            if pending > 0 {
                tracing::warn!(
                    pending,
                    "Connection lost; pending calls will wait for their own timeout"
                );
            }
        }
    }
}

/// One bridge to one robot peer
///
/// Cheap to clone; clones share the same connection and state. Call
/// [`Session::start`] from within a Tokio runtime to begin connecting.
/// [`Session::stop`] is final.
#[derive(Clone)]
pub struct Session {
    transport: Transport,
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(config: BridgeConfig, frames: Arc<dyn FrameSink>) -> Self {
        let verbose = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            correlator: CallCorrelator::new(),
            state: StateCache::new(),
            backpack: Mutex::new(BackpackLights::new()),
            verbose: Arc::clone(&verbose),
            frames,
            config,
        });

        let router = Arc::new(Router {
            shared: Arc::clone(&shared),
        });
        let transport = Transport::new(
            shared.config.url.clone(),
            shared.config.reconnect.clone(),
            router,
            verbose,
        );

        Self { transport, shared }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Begin connecting; reconnection is automatic from here on
    pub fn start(&self) {
        tracing::info!(url = %self.shared.config.url, "Starting bridge session");
        self.transport.connect();
    }

    /// Close the connection, stop reconnecting and fail every pending call
    pub fn stop(&self) {
        self.transport.shutdown();
        let failed = self.shared.correlator.fail_all();
        tracing::info!(failed, "Bridge session stopped");
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Number of calls waiting for a reply
    pub fn pending_calls(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    /// Current contents of the five backpack light slots
    pub fn backpack(&self) -> BackpackLights {
        *self.shared.backpack.lock()
    }

    pub fn set_verbose_logging(&self, on: bool) {
        self.shared.verbose.store(on, Ordering::Relaxed);
        tracing::info!(verbose = on, "Verbose protocol logging");
    }

    pub fn is_verbose(&self) -> bool {
        self.shared.verbose.load(Ordering::Relaxed)
    }

    /// Send one call and, if it is awaited, wait for its reply
    ///
    /// The waiter is registered before the call is sent. A call sent while
    /// disconnected is retried once after the configured delay.
    pub async fn dispatch(&self, command: OutboundCommand) -> CallOutcome {
        let calls = &self.shared.config.calls;
        let timeout = command.timeout.unwrap_or_else(|| calls.default_timeout());
        let await_result = command.await_result;

        let mut request = command.into_request();
        let call_id = CallCorrelator::attach_call_id(&mut request);
        tracing::debug!(
            method = %request.method,
            call_id = %call_id,
            await_result,
            "Dispatching call"
        );

        let pending = await_result.then(|| self.shared.correlator.register(call_id));
        self.transport
            .send_with_retry(&ClientMessage::Call(request), calls.send_retry_delay());

        match pending {
            Some(pending) => pending.wait(timeout).await,
            None => CallOutcome::Sent,
        }
    }

    /// Run a block operation by opcode name
    ///
    /// Unknown opcodes and unusable arguments are errors and nothing is sent.
    /// Everything after encoding resolves to a [`CallOutcome`].
    pub async fn perform(&self, opcode: &str, args: &BlockArgs) -> Result<CallOutcome> {
        let opcode: Opcode = opcode.parse()?;
        let command = {
            let mut backpack = self.shared.backpack.lock();
            encode(opcode, args, &mut backpack)?
        };
        Ok(self.dispatch(command).await)
    }

    /// Cache-first state read
    ///
    /// Without a cached snapshot this polls the peer once and falls back to
    /// the default snapshot if nothing arrives in time.
    pub async fn request_state(&self) -> Arc<StateSnapshot> {
        let timeout = self.shared.config.state.timeout();
        self.shared
            .state
            .request(timeout, || self.poll_state())
            .await
    }

    /// State read that always waits for a fresh push
    pub async fn refresh_state(&self) -> Arc<StateSnapshot> {
        let timeout = self.shared.config.state.timeout();
        self.shared
            .state
            .refresh(timeout, || self.poll_state())
            .await
    }

    /// Drop the cached snapshot
    pub fn invalidate_state(&self) {
        self.shared.state.invalidate();
    }

    pub async fn read_sensor(&self, sensor: Sensor) -> SensorValue {
        let snapshot = self.request_state().await;
        if sensor.is_cube_sensor() && self.is_verbose() {
            tracing::info!(sensor = %sensor, state = ?snapshot.fields(), "Cube sensor state");
        }
        sensor.read(&snapshot)
    }

    fn poll_state(&self) {
        if !self.transport.send(&ClientMessage::GetState) {
            tracing::debug!("State poll not sent, waiting for fallback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use crate::video::LatestFrame;
    use cozbridge_protocol::CallId;
    use serde_json::{json, Map};
    use std::time::Duration;

    fn offline_config() -> BridgeConfig {
        BridgeConfig {
            url: "ws://127.0.0.1:1".into(),
            reconnect: ReconnectConfig {
                interval_ms: 10_000,
                max_attempts: Some(1),
            },
            ..BridgeConfig::default()
        }
    }

    fn session(config: BridgeConfig) -> Session {
        Session::new(config, Arc::new(LatestFrame::new()))
    }

    fn router(session: &Session) -> Router {
        Router {
            shared: Arc::clone(&session.shared),
        }
    }

    #[tokio::test]
    async fn test_perform_unknown_opcode() {
        let session = session(offline_config());
        let err = session.perform("fly", &BlockArgs::new()).await.unwrap_err();
        assert!(matches!(err, cozbridge_utils::BridgeError::UnknownOperation(_)));
        assert_eq!(session.transport().connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_perform_missing_argument() {
        let session = session(offline_config());
        let err = session
            .perform("play_song", &BlockArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, cozbridge_utils::BridgeError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_fire_and_forget_while_offline() {
        let session = session(offline_config());
        let outcome = session
            .perform("stop_all_motors", &BlockArgs::new())
            .await
            .unwrap();
        assert_eq!(outcome, CallOutcome::Sent);
        assert!(session.transport().connect_attempts() >= 1);
        session.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaited_call_times_out_offline() {
        let session = session(offline_config());
        let outcome = session
            .perform(
                "drive_straight",
                &BlockArgs::new().with("DISTANCE", 100).with("AWAIT", true),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CallOutcome::TimedOut);
        assert_eq!(session.pending_calls(), 0);
        session.stop();
    }

    #[tokio::test]
    async fn test_backpack_state_persists_between_calls() {
        let session = session(offline_config());
        session
            .perform("set_backpack_preset", &BlockArgs::new().with("PRESET", "blue"))
            .await
            .unwrap();
        session
            .perform(
                "set_backpack_led",
                &BlockArgs::new().with("INDEX", 1).with("PRESET", "red"),
            )
            .await
            .unwrap();

        let slots = *session.backpack().slots();
        assert_eq!(slots[0], cozbridge_protocol::Light::Solid([255, 0, 0]));
        assert_eq!(slots[4], cozbridge_protocol::Light::Solid([0, 0, 255]));
        session.stop();
    }

    #[tokio::test]
    async fn test_router_resolves_calls_and_updates_state() {
        let session = session(offline_config());
        let router = router(&session);

        let id = CallId::generate();
        let pending = session.shared.correlator.register(id.clone());
        router.handle(PeerMessage::CallResult {
            call_id: id.clone(),
            data: json!({"call_id": id.as_str(), "result": "done"}),
        });
        let outcome = pending.wait(Duration::from_secs(1)).await;
        assert_eq!(outcome.as_value()["result"], json!("done"));

        let mut fields = Map::new();
        fields.insert("is_picked_up".into(), json!(true));
        router.handle(PeerMessage::State(StateSnapshot::new(fields)));
        assert_eq!(
            session.read_sensor(Sensor::IsPickedUp).await,
            SensorValue::Flag(true)
        );
        // Served from cache, no connection attempted
        assert_eq!(session.transport().connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_policy() {
        let keep = session(offline_config());
        let pending = keep.shared.correlator.register(CallId::generate());
        router(&keep).on_disconnected();
        assert_eq!(keep.pending_calls(), 1);
        drop(pending);

        let mut config = offline_config();
        config.calls.fail_pending_on_disconnect = true;
        let fail_fast = session(config);
        let pending = fail_fast.shared.correlator.register(CallId::generate());
        router(&fail_fast).on_disconnected();
        assert_eq!(fail_fast.pending_calls(), 0);
        assert_eq!(
            pending.wait(Duration::from_secs(1)).await,
            CallOutcome::Disconnected
        );
    }

    #[tokio::test]
    async fn test_stop_fails_pending_calls() {
        let session = session(offline_config());
        let pending = session.shared.correlator.register(CallId::generate());
        session.stop();
        assert!(session.transport().is_shut_down());
        assert_eq!(
            pending.wait(Duration::from_secs(1)).await,
            CallOutcome::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_state_falls_back_offline() {
        let session = session(offline_config());
        let state = session.request_state().await;
        assert_eq!(state.integer("battery"), Some(0));
        assert_eq!(
            session.read_sensor(Sensor::CubeTappedId).await,
            SensorValue::Integer(0)
        );
        session.stop();
    }

    #[test]
    fn test_verbose_toggle() {
        let session = session(offline_config());
        assert!(!session.is_verbose());
        session.set_verbose_logging(true);
        assert!(session.is_verbose());
    }
}
