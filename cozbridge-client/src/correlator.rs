//! Call correlation
//!
//! Every awaited call carries a unique id in its keyword arguments. The
//! correlator keeps one completion channel per id; the dispatch path resolves
//! it when the matching `call_result` arrives, and the caller's deadline
//! resolves it otherwise. Whichever happens first wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use cozbridge_protocol::messages::CALL_ID_KWARG;
use cozbridge_protocol::{CallId, CallRequest};

/// How a call finished
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The peer replied; carries the reply payload
    Completed(Value),
    /// Fire-and-forget call handed to the transport
    Sent,
    /// No reply before the deadline
    TimedOut,
    /// Nothing to await (no call id)
    Skipped,
    /// The bridge failed the call when the connection went away
    Disconnected,
}

impl CallOutcome {
    /// Value handed back to the block surface
    ///
    /// A reply yields its payload (`true` for an empty one); every sentinel
    /// other than [`CallOutcome::Sent`] is `false`.
    pub fn as_value(&self) -> Value {
        match self {
            Self::Completed(Value::Null) | Self::Sent => Value::Bool(true),
            Self::Completed(data) => data.clone(),
            Self::TimedOut | Self::Skipped | Self::Disconnected => Value::Bool(false),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Sent)
    }
}

type Waiters = Arc<Mutex<HashMap<CallId, oneshot::Sender<CallOutcome>>>>;

/// Tracks in-flight calls and their completion channels
#[derive(Clone, Default)]
pub struct CallCorrelator {
    pending: Waiters,
}

impl CallCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh id and store it in the call's keyword arguments
    pub fn attach_call_id(call: &mut CallRequest) -> CallId {
        let id = CallId::generate();
        call.kwargs
            .insert(CALL_ID_KWARG.into(), Value::String(id.as_str().to_string()));
        id
    }

    /// Register a waiter for `id`
    ///
    /// Register before sending so a fast reply cannot slip past.
    pub fn register(&self, id: CallId) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        if self.pending.lock().insert(id.clone(), tx).is_some() {
            tracing::warn!(call_id = %id, "Replaced an existing waiter for call id");
        }
        PendingCall {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Wait for the reply to `id`, or resolve to a sentinel
    ///
    /// No id resolves immediately to [`CallOutcome::Skipped`].
    pub async fn await_result(&self, id: Option<CallId>, timeout: Duration) -> CallOutcome {
        match id {
            Some(id) => self.register(id).wait(timeout).await,
            None => CallOutcome::Skipped,
        }
    }

    /// Complete the waiter for `id` with the peer's reply
    ///
    /// Returns false when the id is unknown (already resolved, timed out, or
    /// never registered); the reply is dropped.
    pub fn resolve(&self, id: &CallId, data: Value) -> bool {
        let waiter = self.pending.lock().remove(id);
        match waiter {
            Some(tx) => {
                // Receiver gone means the caller stopped waiting
                let _ = tx.send(CallOutcome::Completed(data));
                true
            }
            None => {
                tracing::debug!(call_id = %id, "Dropping reply for unknown call");
                false
            }
        }
    }

    /// Resolve every pending call with [`CallOutcome::Disconnected`]
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(CallOutcome::Disconnected);
        }
        count
    }

    pub fn is_pending(&self, id: &CallId) -> bool {
        self.pending.lock().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// A registered waiter for one call
///
/// Dropping it unregisters the id.
pub struct PendingCall {
    id: CallId,
    rx: oneshot::Receiver<CallOutcome>,
    pending: Waiters,
}

impl PendingCall {
    pub fn id(&self) -> &CallId {
        &self.id
    }

    /// Wait for the reply, resolving to [`CallOutcome::TimedOut`] at the deadline
    pub async fn wait(mut self, timeout: Duration) -> CallOutcome {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => CallOutcome::Disconnected,
            Err(_) => {
                self.pending.lock().remove(&self.id);
                // A reply may have landed between the deadline and the prune
                match self.rx.try_recv() {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::debug!(call_id = %self.id, ?timeout, "Call timed out");
                        CallOutcome::TimedOut
                    }
                }
            }
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}
