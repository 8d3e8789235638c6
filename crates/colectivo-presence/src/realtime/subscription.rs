//! State shared by a session channel, its connection task, and its subscriptions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};

use super::types::{ChannelEvent, ConnectionState, FatalError};

struct Subscriber {
    events: HashSet<String>,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

type SubscriberMap = HashMap<u64, Subscriber>;

/// Connection state plus the subscriber table.
///
/// Every `open` and `close` starts a new epoch. Updates tagged with an older
/// epoch come from a connection task that has been superseded and are dropped.
pub(crate) struct ChannelShared {
    state: watch::Sender<ConnectionState>,
    epoch: AtomicU64,
    next_id: AtomicU64,
    subscribers: Mutex<SubscriberMap>,
}

impl ChannelShared {
    pub(crate) fn new() -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            state,
            epoch: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Invalidate every running connection task and return the new epoch.
    pub(crate) fn begin_epoch(&self) -> u64 {
        let _guard = self.lock();
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Move to `next` and tell every subscriber, unless `next` is already
    /// the current state. Returns whether anything changed.
    pub(crate) fn set_state(&self, epoch: u64, next: ConnectionState) -> bool {
        let mut subscribers = self.lock();
        if !self.is_current(epoch) {
            return false;
        }
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            dispatch(&mut subscribers, &ChannelEvent::State(next), |_| true);
        }
        changed
    }

    /// Deliver a frame to the subscriptions that asked for `event`.
    pub(crate) fn dispatch_message(&self, epoch: u64, event: &str, data: &serde_json::Value) {
        let mut subscribers = self.lock();
        if !self.is_current(epoch) {
            return;
        }
        let message = ChannelEvent::Message {
            event: event.to_string(),
            data: data.clone(),
        };
        dispatch(&mut subscribers, &message, |s| s.events.contains(event));
    }

    pub(crate) fn dispatch_fatal(&self, epoch: u64, error: FatalError) {
        let mut subscribers = self.lock();
        if !self.is_current(epoch) {
            return;
        }
        dispatch(&mut subscribers, &ChannelEvent::Fatal(error), |_| true);
    }

    pub(crate) fn subscribe(self: &Arc<Self>, events: &[&str]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            Subscriber {
                events: events.iter().map(|e| e.to_string()).collect(),
                tx,
            },
        );
        Subscription {
            id,
            rx,
            shared: Arc::clone(self),
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, SubscriberMap> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Send `event` to every matching subscriber, dropping the ones whose
/// receiving side is gone.
fn dispatch(
    subscribers: &mut SubscriberMap,
    event: &ChannelEvent,
    wants: impl Fn(&Subscriber) -> bool,
) {
    subscribers.retain(|_, s| !wants(s) || s.tx.send(event.clone()).is_ok());
}

// ---------------------------------------------------------------------------
// Subscription handle
// ---------------------------------------------------------------------------

/// A scoped registration for a set of event names.
///
/// Besides matching frames, every subscription receives all connection state
/// transitions, interleaved in arrival order. Dropping the handle unregisters it.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
    shared: Arc<ChannelShared>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.unsubscribe(self.id);
    }
}
