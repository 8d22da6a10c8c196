//! Message types exchanged with the robot peer
//!
//! Outbound traffic is JSON text: `{"cmd": "call", "args": [...]}` for remote
//! calls and `{"cmd": "get_state", "args": []}` for an explicit state poll.
//! Inbound text is either a state push (`{"state": {...}}`), a call reply
//! (`{"event": "call_result", "data": {"call_id": ...}}`), an acknowledgement
//! (`{"ok": true, "cmd": ...}`) or some other event.

use serde::ser::{SerializeStruct, SerializeTuple};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{is_truthy, Arg, CallId, StateSnapshot};

/// Command name for remote calls
pub const CMD_CALL: &str = "call";
/// Command name for state polls
pub const CMD_GET_STATE: &str = "get_state";
/// Event name of call replies
pub const EVENT_CALL_RESULT: &str = "call_result";
/// Keyword argument carrying the call id
pub const CALL_ID_KWARG: &str = "__call_id";

/// Protocol error
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Header is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("Binary message has no header delimiter")]
    MissingDelimiter,

    #[error("Call result without a call id")]
    MissingCallId,

    #[error("Unexpected message shape: {0}")]
    UnexpectedShape(String),
}

/// A remote procedure call
///
/// Serialized as the positional tuple `[method, args, kwargs, await]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Peer-side action path, e.g. `robot.drive_straight`
    pub method: String,
    pub args: Vec<Arg>,
    /// Keyword arguments; always carries the call id
    pub kwargs: Map<String, Value>,
    /// Whether the peer should wait for the action to complete before replying
    pub await_result: bool,
}

impl CallRequest {
    pub fn new(method: impl Into<String>, args: Vec<Arg>, await_result: bool) -> Self {
        Self {
            method: method.into(),
            args,
            kwargs: Map::new(),
            await_result,
        }
    }

    /// Call id attached to the keyword arguments, if any
    pub fn call_id(&self) -> Option<CallId> {
        self.kwargs
            .get(CALL_ID_KWARG)
            .and_then(Value::as_str)
            .map(CallId::from_peer)
    }
}

impl Serialize for CallRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.method)?;
        tuple.serialize_element(&self.args)?;
        tuple.serialize_element(&self.kwargs)?;
        tuple.serialize_element(&self.await_result)?;
        tuple.end()
    }
}

/// Messages sent from the bridge to the peer
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Call(CallRequest),
    GetState,
}

impl ClientMessage {
    /// Serialize to the JSON text frame sent on the socket
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Command name, for logging
    pub fn command(&self) -> &'static str {
        match self {
            Self::Call(_) => CMD_CALL,
            Self::GetState => CMD_GET_STATE,
        }
    }
}

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut msg = serializer.serialize_struct("ClientMessage", 2)?;
        msg.serialize_field("cmd", self.command())?;
        match self {
            Self::Call(call) => msg.serialize_field("args", call)?,
            Self::GetState => msg.serialize_field("args", &[] as &[Value])?,
        }
        msg.end()
    }
}

/// Messages received from the peer as text frames
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// Full state push
    State(StateSnapshot),
    /// Reply to an earlier call; `data` is the whole reply payload
    CallResult { call_id: CallId, data: Value },
    /// Command acknowledgement
    Ack { cmd: Option<String> },
    /// Any other named event
    Event { name: String, data: Option<Value> },
}

/// Parse a text frame from the peer
///
/// Shapes are checked in priority order: a `state` object wins over an
/// `event` tag. A falsy `state` (null, false, 0, "") counts as absent. Call replies accept `call_id`, `callId` or `id` as the id
/// key, as a string or a number.
pub fn parse_peer_text(text: &str) -> Result<PeerMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut obj) = value else {
        return Err(ProtocolError::UnexpectedShape("not an object".into()));
    };

    match obj.remove("state") {
        Some(Value::Object(fields)) => return Ok(PeerMessage::State(StateSnapshot::new(fields))),
        Some(ref falsy) if !is_truthy(falsy) => {}
        None => {}
        Some(other) => {
            return Err(ProtocolError::UnexpectedShape(format!(
                "state is not an object: {}",
                other
            )))
        }
    }

    if let Some(name) = obj.get("event").and_then(Value::as_str).map(str::to_string) {
        let data = obj.remove("data");
        if name == EVENT_CALL_RESULT {
            let data = data.unwrap_or_else(|| Value::Object(Map::new()));
            let call_id = extract_call_id(&data).ok_or(ProtocolError::MissingCallId)?;
            return Ok(PeerMessage::CallResult { call_id, data });
        }
        return Ok(PeerMessage::Event { name, data });
    }

    if obj.contains_key("ok") {
        let cmd = obj.get("cmd").and_then(Value::as_str).map(str::to_string);
        return Ok(PeerMessage::Ack { cmd });
    }

    Err(ProtocolError::UnexpectedShape(
        "no state, event or ok field".into(),
    ))
}

fn extract_call_id(data: &Value) -> Option<CallId> {
    ["call_id", "callId", "id"]
        .iter()
        .filter_map(|key| data.get(*key))
        .find_map(|raw| match raw {
            Value::String(s) if !s.is_empty() => Some(CallId::from_peer(s.clone())),
            Value::Number(n) => Some(CallId::from_peer(n.to_string())),
            _ => None,
        })
}
