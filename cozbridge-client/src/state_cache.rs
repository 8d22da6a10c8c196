//! Robot state cache
//!
//! Holds the last snapshot pushed by the peer. Reads are served from the
//! cache when possible; otherwise the reader queues a waiter, a `get_state`
//! poll goes out, and the next push wakes every queued waiter at once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use cozbridge_protocol::StateSnapshot;

#[derive(Default)]
struct CacheState {
    last: Option<Arc<StateSnapshot>>,
    waiters: Vec<oneshot::Sender<Arc<StateSnapshot>>>,
}

/// Last-known robot state plus readers waiting for the next push
#[derive(Default)]
pub struct StateCache {
    state: Mutex<CacheState>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot, if any has arrived
    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.state.lock().last.clone()
    }

    /// Replace the snapshot and wake every queued waiter
    ///
    /// The queue is emptied under the lock before any waiter is woken.
    /// Returns the number of waiters woken.
    pub fn update(&self, snapshot: StateSnapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let waiters = {
            let mut state = self.state.lock();
            state.last = Some(Arc::clone(&snapshot));
            std::mem::take(&mut state.waiters)
        };

        let mut woken = 0;
        for waiter in waiters {
            if waiter.send(Arc::clone(&snapshot)).is_ok() {
                woken += 1;
            }
        }
        woken
    }

    /// Forget the cached snapshot so the next read polls the peer
    pub fn invalidate(&self) {
        self.state.lock().last = None;
    }

    /// Number of readers waiting for a push
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Cache-first read
    ///
    /// A cached snapshot is returned without calling `poll`. Otherwise the
    /// reader is queued, `poll` is called once, and the reader waits up to
    /// `timeout` before falling back to [`StateSnapshot::fallback`].
    pub async fn request<F>(&self, timeout: Duration, poll: F) -> Arc<StateSnapshot>
    where
        F: FnOnce(),
    {
        let rx = {
            let mut state = self.state.lock();
            if let Some(last) = &state.last {
                return Arc::clone(last);
            }
            Self::enqueue(&mut state)
        };

        poll();
        Self::wait(rx, timeout).await
    }

    /// Always poll and wait for the next push, ignoring the cached value
    pub async fn refresh<F>(&self, timeout: Duration, poll: F) -> Arc<StateSnapshot>
    where
        F: FnOnce(),
    {
        let rx = Self::enqueue(&mut self.state.lock());
        poll();
        Self::wait(rx, timeout).await
    }

    fn enqueue(state: &mut CacheState) -> oneshot::Receiver<Arc<StateSnapshot>> {
        // Drop waiters whose readers already gave up
        state.waiters.retain(|w| !w.is_closed());
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        rx
    }

    async fn wait(
        rx: oneshot::Receiver<Arc<StateSnapshot>>,
        timeout: Duration,
    ) -> Arc<StateSnapshot> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(snapshot)) => snapshot,
            _ => {
                tracing::debug!(?timeout, "No state push in time, using fallback snapshot");
                Arc::new(StateSnapshot::fallback())
            }
        }
    }
}
